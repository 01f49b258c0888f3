/// mudcore server binary
///
/// Usage: `mudcore [config.xml]`. Without an argument the built-in defaults
/// are used.

use anyhow::Context;
use mudcore::{init_logging, Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => ServerConfig::default(),
    };

    let server = Server::bind(config).await.context("Failed to start server")?;

    tokio::select! {
        result = server.run() => result.context("Listener failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    server.flush().await;

    Ok(())
}
