use anyhow::Result;
use talqai_server::{config, server};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (before logging setup)
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG, when set, takes precedence over the configured level
    let log_level = config.server.logs.level.clone();
    if let Err(e) = config::validate_log_level(&log_level) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let filter = config::log_filter(&log_level, std::env::var("RUST_LOG").ok().as_deref());
    let effective = filter.to_string();

    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting talqai server with log filter: {}", effective);

    server::run(config).await?;

    Ok(())
}
