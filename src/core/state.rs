/// Shared server state handed to every session
///
/// Everything here is behind an `Arc` and internally synchronized, so the
/// state is cloned into each connection task.

use crate::commands::{ActionHandler, CommandHandler, DefaultActions, DefaultCommands};
use crate::config::ServerConfig;
use crate::core::{EntityStore, EventBus, WorldHook};
use crate::persistence::Persister;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Single live instance of every entity
    pub store: Arc<EntityStore>,

    /// Per-session event queues
    pub bus: Arc<EventBus>,

    pub actions: Arc<dyn ActionHandler>,
    pub commands: Arc<dyn CommandHandler>,
}

impl AppState {
    /// Wire a store and bus together, saving changes through `persister`
    pub fn new(config: ServerConfig, persister: Arc<dyn Persister>) -> Self {
        let bus = Arc::new(EventBus::new(config.event_queue_capacity));
        let hook = Arc::new(WorldHook::new(persister, bus.clone()));

        Self {
            config: Arc::new(config),
            store: Arc::new(EntityStore::new(hook)),
            bus,
            actions: Arc::new(DefaultActions),
            commands: Arc::new(DefaultCommands),
        }
    }

    /// Replace the default action and command handlers
    pub fn with_handlers(
        mut self,
        actions: Arc<dyn ActionHandler>,
        commands: Arc<dyn CommandHandler>,
    ) -> Self {
        self.actions = actions;
        self.commands = commands;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("server", &self.config.name)
            .field("entities", &self.store.len())
            .field("sessions", &self.bus.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersister;
    use crate::world::Coordinate;

    #[test]
    fn test_changes_flow_to_persister() {
        let persister = Arc::new(MemoryPersister::new());
        let state = AppState::new(ServerConfig::default(), persister.clone());

        let zone = state.store.create_zone("Midgaard");
        let room = state.store.create_room(zone.id(), Coordinate::ORIGIN);
        room.set_title("Temple");

        assert_eq!(persister.count(), 3);
        assert_eq!(persister.latest(room.id()).unwrap().data["title"], "Temple");
    }

    #[tokio::test]
    async fn test_room_events_reach_the_bus() {
        let state = AppState::new(ServerConfig::default(), Arc::new(MemoryPersister::new()));
        let room = state.store.start_room().unwrap();
        let watcher = state.store.create_character("watcher", room.id());
        let mut events = state.bus.register(watcher);

        room.set_description("Dusty");

        assert!(events.try_recv().is_some());
    }
}
