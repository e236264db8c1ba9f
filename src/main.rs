use clap::Parser;
use dotenvy::dotenv;
use pdf_image_pipeline::config::PipelineConfig;
use pdf_image_pipeline::infrastructure::storage;
use pdf_image_pipeline::services::rasterizer::PopplerRasterizer;
use pdf_image_pipeline::services::worker::JobReaper;
use pdf_image_pipeline::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_image_pipeline=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting PDF image pipeline...");

    let config = PipelineConfig::from_env();
    info!(
        "🗂️  Intake: {}, Staging: {}, Scope: {:?}, DPI: {}, Max jobs: {}",
        config.upload_dir.display(),
        config.images_dir.display(),
        config.workspace_scope,
        config.render_dpi,
        if config.max_concurrent_jobs == 0 {
            "unbounded".to_string()
        } else {
            config.max_concurrent_jobs.to_string()
        }
    );

    let storage_service = storage::setup_storage(&config).await;
    let state = AppState::new(
        config.clone(),
        storage_service,
        Arc::new(PopplerRasterizer::new()),
    );
    state.pipeline.workspace().ensure_roots().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    if config.job_retention_secs > 0 {
        let reaper = JobReaper::new(
            state.jobs.clone(),
            Duration::from_secs(config.job_retention_secs),
            Duration::from_secs(config.reaper_interval_secs.max(1)),
            shutdown_rx,
        );
        tokio::spawn(reaper.run());
        info!("👷 Job reaper initialized.");
    }

    let app = create_app(state);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    info!("👋 Server exited cleanly, unfinished jobs were abandoned.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
