//! Gatehouse entry point.
//!
//! Reads the configuration file location from `CONFIG_FILEPATH` (the
//! extension selects YAML or JSON), loads and validates it, and serves. Any
//! startup failure prints a single diagnostic to stderr and exits without
//! listening.

use gatehouse::GatewayServer;
use gatehouse_core::{load_config, load_env};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gatehouse=info")),
        )
        .init();

    let env = match load_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("[ERROR] could not load config: {e}");
            std::process::exit(1);
        }
    };

    let config = match load_config(&env.path, env.file_type) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] could not load config: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = GatewayServer::new(config).run().await {
        eprintln!("[ERROR] gateway failed: {e}");
        std::process::exit(1);
    }
}
