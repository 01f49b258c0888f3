/// mudcore - concurrent world engine for a multiplayer text MUD server
///
/// Many connections read and mutate one shared graph of rooms, characters
/// and items. Each entity lives once, behind its own lock, in the entity
/// store; changes fan out to live sessions through the event bus; each
/// session interleaves its player's input with those events.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod persistence;
pub mod world;

// Re-export commonly used types
pub use crate::config::ServerConfig;
pub use crate::core::{AppState, EntityStore, EventBus, Id, MudEvent, Session, SessionState};
pub use crate::error::{MudError, Result};
pub use crate::network::Server;

/// Initialize logging infrastructure
///
/// Honors `RUST_LOG`; defaults to INFO. Safe to call more than once.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();

    if installed.is_ok() {
        tracing::info!("mudcore {} starting", env!("CARGO_PKG_VERSION"));
    }
}
