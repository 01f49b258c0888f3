/// Entity store: one live instance per identity
///
/// Every lookup of the same id returns a handle to the same `Arc`, so two
/// sessions touching "the same room" contend on the same lock and see each
/// other's writes. All cross-entity references go through here.

use crate::core::{ChangeHook, EntityKind, Id, Locked, Record};
use crate::error::{MudError, Result};
use crate::world::{
    Character, CharacterData, Coordinate, Item, ItemData, Room, RoomData, Template, TemplateData,
    Zone, ZoneData,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared handle to any world object
#[derive(Debug, Clone)]
pub enum Entity {
    Character(Arc<Character>),
    Room(Arc<Room>),
    Zone(Arc<Zone>),
    Item(Arc<Item>),
    Template(Arc<Template>),
}

impl Entity {
    pub fn id(&self) -> Id {
        match self {
            Entity::Character(e) => e.id(),
            Entity::Room(e) => e.id(),
            Entity::Zone(e) => e.id(),
            Entity::Item(e) => e.id(),
            Entity::Template(e) => e.id(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Character(_) => EntityKind::Character,
            Entity::Room(_) => EntityKind::Room,
            Entity::Zone(_) => EntityKind::Zone,
            Entity::Item(_) => EntityKind::Item,
            Entity::Template(_) => EntityKind::Template,
        }
    }

    pub fn snapshot(&self) -> Result<Record> {
        match self {
            Entity::Character(e) => e.snapshot(),
            Entity::Room(e) => e.snapshot(),
            Entity::Zone(e) => e.snapshot(),
            Entity::Item(e) => e.snapshot(),
            Entity::Template(e) => e.snapshot(),
        }
    }
}

/// Field types that can live in the store
pub trait EntityData: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    const KIND: EntityKind;

    fn wrap(entity: Arc<Locked<Self>>) -> Entity;

    fn unwrap(entity: &Entity) -> Option<Arc<Locked<Self>>>;
}

/// Process-wide registry of live entities
pub struct EntityStore {
    entities: DashMap<Id, Entity>,
    hook: Arc<dyn ChangeHook>,

    /// Held across every lookup-then-create
    creation: Mutex<()>,
}

impl EntityStore {
    /// Create an empty store; every entity it creates reports to `hook`
    pub fn new(hook: Arc<dyn ChangeHook>) -> Self {
        Self {
            entities: DashMap::new(),
            hook,
            creation: Mutex::new(()),
        }
    }

    /// Look up any entity, checking its kind
    ///
    /// An unknown id or a wrong kind means a caller holds an id it did not
    /// get from the object graph; both are reported as fatal errors.
    pub fn retrieve_any(&self, id: Id, kind: EntityKind) -> Result<Entity> {
        let entity = self
            .entities
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(MudError::UnknownEntity { id, kind })?;

        if entity.kind() != kind {
            return Err(MudError::KindMismatch {
                id,
                expected: kind,
                found: entity.kind(),
            });
        }
        Ok(entity)
    }

    /// Typed lookup
    pub fn retrieve<T: EntityData>(&self, id: Id) -> Result<Arc<Locked<T>>> {
        let entity = self.retrieve_any(id, T::KIND)?;
        T::unwrap(&entity).ok_or(MudError::KindMismatch {
            id,
            expected: T::KIND,
            found: entity.kind(),
        })
    }

    pub fn character(&self, id: Id) -> Result<Arc<Character>> {
        self.retrieve::<CharacterData>(id)
    }

    pub fn room(&self, id: Id) -> Result<Arc<Room>> {
        self.retrieve::<RoomData>(id)
    }

    pub fn zone(&self, id: Id) -> Result<Arc<Zone>> {
        self.retrieve::<ZoneData>(id)
    }

    pub fn item(&self, id: Id) -> Result<Arc<Item>> {
        self.retrieve::<ItemData>(id)
    }

    pub fn template(&self, id: Id) -> Result<Arc<Template>> {
        self.retrieve::<TemplateData>(id)
    }

    pub fn contains(&self, id: Id) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ========================================
    // Creation
    // ========================================

    pub fn create_zone(&self, name: &str) -> Arc<Zone> {
        self.adopt(ZoneData {
            name: name.trim().to_string(),
        })
    }

    pub fn create_room(&self, zone_id: Id, location: Coordinate) -> Arc<Room> {
        self.adopt(RoomData::new(zone_id, location))
    }

    pub fn create_character(&self, name: &str, room_id: Id) -> Arc<Character> {
        self.adopt(CharacterData::new(name, room_id))
    }

    pub fn create_template(&self, name: &str) -> Arc<Template> {
        self.adopt(TemplateData::new(name))
    }

    pub fn create_item(&self, template_id: Id) -> Arc<Item> {
        self.adopt(ItemData::new(template_id))
    }

    /// Register a new entity and persist its initial state
    fn adopt<T: EntityData>(&self, fields: T) -> Arc<Locked<T>> {
        let entity = Arc::new(Locked::new(Id::new(), T::KIND, fields, self.hook.clone()));
        self.entities.insert(entity.id(), T::wrap(entity.clone()));
        entity.persist();

        debug!("Created {} {}", T::KIND, entity.id());
        entity
    }

    /// Rebuild an entity from a stored record without notifying the hook
    ///
    /// If the id is already live the existing instance is kept and returned.
    pub fn restore(&self, record: Record) -> Result<Entity> {
        match record.kind {
            EntityKind::Character => self.restore_as::<CharacterData>(record),
            EntityKind::Room => self.restore_as::<RoomData>(record),
            EntityKind::Zone => self.restore_as::<ZoneData>(record),
            EntityKind::Item => self.restore_as::<ItemData>(record),
            EntityKind::Template => self.restore_as::<TemplateData>(record),
        }
    }

    fn restore_as<T: EntityData>(&self, record: Record) -> Result<Entity> {
        let fields: T = serde_json::from_value(record.data)?;

        match self.entities.entry(record.id) {
            Entry::Occupied(existing) => {
                warn!("{} {} already loaded, keeping live instance", record.kind, record.id);
                Ok(existing.get().clone())
            }
            Entry::Vacant(slot) => {
                let entity = T::wrap(Arc::new(Locked::new(
                    record.id,
                    T::KIND,
                    fields,
                    self.hook.clone(),
                )));
                slot.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    // ========================================
    // Queries
    // ========================================

    /// All live entities of one type
    pub fn all<T: EntityData>(&self) -> Vec<Arc<Locked<T>>> {
        self.entities
            .iter()
            .filter_map(|entry| T::unwrap(entry.value()))
            .collect()
    }

    pub fn characters_in(&self, room_id: Id) -> Vec<Arc<Character>> {
        let mut characters: Vec<_> = self
            .all::<CharacterData>()
            .into_iter()
            .filter(|c| c.room_id() == room_id)
            .collect();
        characters.sort_by_key(|c| c.name());
        characters
    }

    /// Case-insensitive lookup by name
    pub fn find_character(&self, name: &str) -> Option<Arc<Character>> {
        let name = name.trim().to_lowercase();
        self.all::<CharacterData>()
            .into_iter()
            .find(|c| c.name().to_lowercase() == name)
    }

    pub fn room_at(&self, zone_id: Id, location: Coordinate) -> Option<Arc<Room>> {
        self.all::<RoomData>()
            .into_iter()
            .find(|r| r.read(|data| data.zone_id == zone_id && data.location == location))
    }

    /// Resolve a list of item ids
    pub fn items(&self, ids: &[Id]) -> Result<Vec<Arc<Item>>> {
        ids.iter().map(|id| self.item(*id)).collect()
    }

    /// Room at `location`, created on a miss
    ///
    /// Also reports whether this call created it. Concurrent callers for the
    /// same square all get the same room.
    pub fn room_at_or_create(&self, zone_id: Id, location: Coordinate) -> (Arc<Room>, bool) {
        let _creating = self.creation.lock();
        match self.room_at(zone_id, location) {
            Some(room) => (room, false),
            None => (self.create_room(zone_id, location), true),
        }
    }

    /// Character called `name`, created in the start room on a miss
    ///
    /// Also reports whether this call created it. Two logins racing on a new
    /// name end up with the same character.
    pub fn character_or_create(&self, name: &str) -> Result<(Arc<Character>, bool)> {
        let _creating = self.creation.lock();
        if let Some(character) = self.find_character(name) {
            return Ok((character, false));
        }
        let room = self.find_or_create_start_room()?;
        Ok((self.create_character(name, room.id()), true))
    }

    /// Room new characters start in
    ///
    /// Picks the room nearest the origin; an empty world gets a default
    /// zone with a single room.
    pub fn start_room(&self) -> Result<Arc<Room>> {
        let _creating = self.creation.lock();
        self.find_or_create_start_room()
    }

    /// Caller holds `creation`
    fn find_or_create_start_room(&self) -> Result<Arc<Room>> {
        let start = self
            .all::<RoomData>()
            .into_iter()
            .min_by_key(|r| {
                let location = r.location();
                (location.z.abs() + location.y.abs() + location.x.abs(), location, r.id())
            });

        if let Some(room) = start {
            return Ok(room);
        }

        let zone = self.create_zone("Default");
        let room = self.create_room(zone.id(), Coordinate::ORIGIN);
        info!("Created start room {} in zone {}", room.id(), zone.id());
        Ok(room)
    }
}
