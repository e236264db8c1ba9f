use crate::config::PipelineConfig;
use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(config: &PipelineConfig) -> Arc<S3StorageService> {
    info!(
        "☁️  S3 Storage: {} (Bucket: {})",
        config.s3_endpoint.as_deref().unwrap_or("aws"),
        config.bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.aws_region.clone()));

    if let Some(endpoint_url) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint_url);
    }

    if let (Some(access_key), Some(secret_key)) = (&config.aws_access_key, &config.aws_secret_key)
    {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Uploads fail per file if the bucket is unreachable, start-up does not
    match s3_client.head_bucket().bucket(&config.bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", config.bucket),
        Err(e) => warn!("⚠️  Bucket '{}' is not reachable yet: {}", config.bucket, e),
    }

    Arc::new(S3StorageService::new(s3_client, config.bucket.clone()))
}
