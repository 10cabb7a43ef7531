mod blur;
mod config;
mod decode;
mod dither;
mod error;
mod http;
mod kernel;
mod parallel;
mod params;
mod pipeline;
mod tone;
mod ui;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config first so we can honor logging.filter directive.
    let cfg = config::ConfigManager::load(None).await?;
    let filter_directive = cfg
        .log_filter()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info,ditherman_server=debug".to_string());
    fmt()
        .with_env_filter(EnvFilter::new(filter_directive))
        .init();
    tracing::debug!(
        workers = parallel::worker_count(),
        max_upload_bytes = cfg.max_upload_bytes(),
        "configuration loaded"
    );
    let app = http::router(&cfg);
    http::serve(app, &cfg.bind_address()).await?;
    Ok(())
}
