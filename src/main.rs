use ferrumkv::{server, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ferrumkv: invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("FerrumKV starting...");

    if let Err(e) = server::run(config).await {
        error!("RESP server error: {:#}", e);
        std::process::exit(1);
    }

    info!("FerrumKV stopped");
}
