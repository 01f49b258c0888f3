/// World event bus
///
/// Mutations publish typed events; every live session registers one inbound
/// queue keyed by its observing character. `publish` fans an event out to
/// each registered observer that should see it (room-scoped events only reach
/// observers standing in that room).
///
/// Queues are bounded and publishing never waits: when an observer's queue is
/// full the event is dropped for that observer and a warning is logged. A slow
/// client can therefore miss notices under load, but it can never stall the
/// session that caused them.

use crate::core::Id;
use crate::world::{Character, Room};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default number of events buffered per subscriber
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Events that occur in the shared world
#[derive(Debug, Clone)]
pub enum MudEvent {
    /// A room's title, description or exits changed
    RoomUpdated {
        room: Arc<Room>,
    },

    /// A character arrived in a room
    Entered {
        character: Arc<Character>,
        room_id: Id,
    },

    /// A character left a room
    Left {
        character: Arc<Character>,
        room_id: Id,
    },

    /// A character spoke aloud
    Say {
        speaker: Arc<Character>,
        room_id: Id,
        text: String,
    },

    /// A character connected
    Login {
        character: Arc<Character>,
    },

    /// A character disconnected
    Logout {
        character: Arc<Character>,
    },
}

pub type Event = MudEvent;

impl MudEvent {
    /// Room this event is confined to, if any
    pub fn room_id(&self) -> Option<Id> {
        match self {
            MudEvent::RoomUpdated { room } => Some(room.id()),
            MudEvent::Entered { room_id, .. }
            | MudEvent::Left { room_id, .. }
            | MudEvent::Say { room_id, .. } => Some(*room_id),
            MudEvent::Login { .. } | MudEvent::Logout { .. } => None,
        }
    }

    /// Character that caused the event, if any
    pub fn actor_id(&self) -> Option<Id> {
        match self {
            MudEvent::RoomUpdated { .. } => None,
            MudEvent::Entered { character, .. }
            | MudEvent::Left { character, .. }
            | MudEvent::Login { character }
            | MudEvent::Logout { character } => Some(character.id()),
            MudEvent::Say { speaker, .. } => Some(speaker.id()),
        }
    }

    /// Delivery policy: room-scoped events reach observers in that room,
    /// the rest reach everyone
    pub fn is_visible_to(&self, observer: &Character) -> bool {
        match self.room_id() {
            Some(room_id) => observer.room_id() == room_id,
            None => true,
        }
    }

    /// Notice shown to `observer`, or `None` if there is nothing to show
    pub fn render(&self, observer: &Character) -> Option<String> {
        if self.actor_id() == Some(observer.id()) {
            return None;
        }

        let text = match self {
            MudEvent::RoomUpdated { .. } => "This room has been modified".to_string(),
            MudEvent::Entered { character, .. } => format!("{} has entered the room", character.name()),
            MudEvent::Left { character, .. } => format!("{} has left the room", character.name()),
            MudEvent::Say { speaker, text, .. } => format!("{} says: {}", speaker.name(), text),
            MudEvent::Login { character } => format!("{} has connected", character.name()),
            MudEvent::Logout { character } => format!("{} has disconnected", character.name()),
        };
        Some(text)
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            MudEvent::RoomUpdated { .. } => "room_updated",
            MudEvent::Entered { .. } => "entered",
            MudEvent::Left { .. } => "left",
            MudEvent::Say { .. } => "say",
            MudEvent::Login { .. } => "login",
            MudEvent::Logout { .. } => "logout",
        }
    }
}

/// Key of one registered queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// A session's inbound event queue
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    observer_id: Id,
    receiver: mpsc::Receiver<MudEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn observer_id(&self) -> Id {
        self.observer_id
    }

    /// Wait for the next event; `None` once unregistered and drained
    pub async fn recv(&mut self) -> Option<MudEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MudEvent> {
        self.receiver.try_recv().ok()
    }
}

struct Subscriber {
    observer: Arc<Character>,
    sender: mpsc::Sender<MudEvent>,
}

/// Event bus for fan-out to live sessions
pub struct EventBus {
    subscribers: DashMap<SubscriptionId, Subscriber>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus whose queues hold up to `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Create a new queue observing as `observer`
    ///
    /// Each call creates an independent queue; a session registers exactly
    /// once and unregisters on teardown.
    pub fn register(&self, observer: Arc<Character>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = SubscriptionId(Uuid::new_v4());
        let observer_id = observer.id();

        self.subscribers.insert(id, Subscriber { observer, sender });
        debug!("Registered subscription {:?} for {}", id, observer_id);

        Subscription {
            id,
            observer_id,
            receiver,
        }
    }

    /// Remove a queue; later publishes skip it
    pub fn unregister(&self, subscription: &Subscription) -> bool {
        let removed = self.subscribers.remove(&subscription.id).is_some();
        if removed {
            debug!(
                "Unregistered subscription {:?} for {}",
                subscription.id,
                subscription.observer_id()
            );
        }
        removed
    }

    /// Deliver `event` to every observer that should see it
    ///
    /// Returns the number of queues the event was placed on.
    pub fn publish(&self, event: MudEvent) -> usize {
        // Copy the targets out first: observer locks are never taken while a
        // map shard is held.
        let targets: Vec<(SubscriptionId, Arc<Character>, mpsc::Sender<MudEvent>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.observer.clone(), entry.sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, observer, sender) in targets {
            if !event.is_visible_to(&observer) {
                continue;
            }

            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Event queue full for {}, dropping {} event",
                        observer.id(),
                        event.name()
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscription {:?} closed, skipping", id);
                }
            }
        }

        debug!("Published {} event to {} subscriber(s)", event.name(), delivered);
        delivered
    }

    /// Get the number of registered queues
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether any live session observes as `character_id`
    pub fn is_online(&self, character_id: Id) -> bool {
        self.subscribers
            .iter()
            .any(|entry| entry.observer.id() == character_id)
    }

    /// Characters with at least one live session
    pub fn online_characters(&self) -> Vec<Arc<Character>> {
        let mut online: Vec<Arc<Character>> = Vec::new();
        for entry in self.subscribers.iter() {
            if !online.iter().any(|c| c.id() == entry.observer.id()) {
                online.push(entry.observer.clone());
            }
        }
        online
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUFFER_SIZE)
    }
}
