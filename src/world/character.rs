/// Player and non-player characters

use crate::core::{Contents, Entity, EntityData, EntityKind, Id, Locked};
use crate::world::format_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    pub name: String,

    /// Room the character currently stands in
    pub room_id: Id,

    #[serde(default)]
    pub npc: bool,

    /// Carried items
    #[serde(default)]
    pub items: Vec<Id>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl CharacterData {
    pub fn new(name: &str, room_id: Id) -> Self {
        Self {
            name: format_name(name),
            room_id,
            npc: false,
            items: Vec::new(),
            created_at: Utc::now(),
            last_login: None,
        }
    }
}

impl Contents for CharacterData {
    fn contents(&self) -> &Vec<Id> {
        &self.items
    }

    fn contents_mut(&mut self) -> &mut Vec<Id> {
        &mut self.items
    }
}

pub type Character = Locked<CharacterData>;

impl Character {
    pub fn name(&self) -> String {
        self.read(|c| c.name.clone())
    }

    pub fn set_name(&self, name: &str) -> bool {
        self.update(format_name(name), |c| &c.name, |c| &mut c.name)
    }

    pub fn room_id(&self) -> Id {
        self.read(|c| c.room_id)
    }

    pub fn set_room_id(&self, room_id: Id) -> bool {
        self.update(room_id, |c| &c.room_id, |c| &mut c.room_id)
    }

    pub fn is_npc(&self) -> bool {
        self.read(|c| c.npc)
    }

    pub fn set_npc(&self, npc: bool) -> bool {
        self.update(npc, |c| &c.npc, |c| &mut c.npc)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.read(|c| c.created_at)
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.read(|c| c.last_login)
    }

    /// Stamp the current time as the last login
    pub fn touch_login(&self) -> bool {
        self.update(Some(Utc::now()), |c| &c.last_login, |c| &mut c.last_login)
    }
}

impl EntityData for CharacterData {
    const KIND: EntityKind = EntityKind::Character;

    fn wrap(entity: Arc<Character>) -> Entity {
        Entity::Character(entity)
    }

    fn unwrap(entity: &Entity) -> Option<Arc<Character>> {
        match entity {
            Entity::Character(character) => Some(character.clone()),
            _ => None,
        }
    }
}
