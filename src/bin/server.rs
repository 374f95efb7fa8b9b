//! Minewire server binary.
//!
//! Usage: minewire-server [-v | --version | --about]
//!
//! Reads `server.yaml` from the working directory and serves until killed.

use std::env;

use minewire::server::{Config, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Some(flag) = env::args().nth(1) {
        if matches!(flag.as_str(), "-v" | "--version" | "--about") {
            println!("Minewire Server v{}", minewire::SERVER_VERSION);
            return Ok(());
        }
    }

    // Respects RUST_LOG (e.g. RUST_LOG=debug); defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::load("server.yaml")?;
    let server = Server::new(config)?;
    server.run().await?;

    Ok(())
}
