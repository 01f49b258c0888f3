/// Core concurrency substrate of the server
///
/// Locked entities, the entity store that hands out their single live
/// instances, the event bus that fans changes out to sessions, and the
/// per-connection session multiplexer.

pub mod entity;
pub mod events;
pub mod id;
pub mod session;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use entity::{Change, ChangeHook, Contents, Locked, Record, WorldHook};
pub use events::{Event, EventBus, MudEvent, Subscription, SubscriptionId, EVENT_BUFFER_SIZE};
pub use id::{EntityKind, Id};
pub use session::{Session, SessionState};
pub use state::AppState;
pub use store::{Entity, EntityData, EntityStore};

#[cfg(test)]
pub use entity::MockChangeHook;
