use crate::error::{PipelineError, Result};
use std::path::{Component, Path, PathBuf};

/// Normalizes a client-supplied relative path for use under a local root.
///
/// Backslashes are treated as separators. `.` and empty segments are dropped.
/// Absolute paths, drive prefixes and any `..` segment are rejected.
pub fn sanitize_relative_path(raw: &str) -> Result<PathBuf> {
    let unified = raw.replace('\\', "/");

    if unified.starts_with('/') {
        return Err(PipelineError::InvalidPath(format!(
            "Absolute paths are not allowed: {}",
            raw
        )));
    }

    let mut sanitized = PathBuf::new();
    for segment in unified.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(PipelineError::InvalidPath(format!(
                "Parent directory references are not allowed: {}",
                raw
            )));
        }
        if segment.contains('\0') {
            return Err(PipelineError::InvalidPath(format!(
                "Null bytes are not allowed: {}",
                raw
            )));
        }
        // Catches drive prefixes such as "C:" on Windows hosts
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => sanitized.push(segment),
            _ => {
                return Err(PipelineError::InvalidPath(format!(
                    "Invalid path segment '{}' in {}",
                    segment, raw
                )));
            }
        }
    }

    Ok(sanitized)
}

/// Case-insensitive extension check on a file name.
pub fn has_extension(name: &str, ext: &str) -> bool {
    let suffix = format!(".{}", ext.to_lowercase());
    name.to_lowercase().ends_with(&suffix)
}

pub fn is_pdf(name: &str) -> bool {
    has_extension(name, "pdf")
}

pub fn is_jpeg(name: &str) -> bool {
    has_extension(name, "jpg")
}

/// File name without its last extension, `report.final.pdf` -> `report.final`.
/// Always a single plain path segment: a stem of `.` or `..` keeps the full
/// file name, and a path without a file name yields `unknown`.
pub fn document_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, _)) if !matches!(stem, "" | "." | "..") => stem.to_string(),
        _ if name.is_empty() => "unknown".to_string(),
        _ => name,
    }
}
