//! Colonia Server
//!
//! Usage: `colonia-server [config.yaml]`

use colonia_server::{serve, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("colonia_server=info,colonia_core=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                error!("Failed to load config {}: {}", path, err);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    info!("Colonia Server v{}", env!("CARGO_PKG_VERSION"));
    if let Err(err) = serve(config).await {
        error!("Server stopped: {}", err);
        std::process::exit(1);
    }
}
