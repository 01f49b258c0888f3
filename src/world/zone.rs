/// Zones group rooms into named areas

use crate::core::{Entity, EntityData, EntityKind, Locked};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub name: String,
}

pub type Zone = Locked<ZoneData>;

impl Zone {
    pub fn name(&self) -> String {
        self.read(|z| z.name.clone())
    }

    pub fn set_name(&self, name: &str) -> bool {
        self.update(name.trim().to_string(), |z| &z.name, |z| &mut z.name)
    }
}

impl EntityData for ZoneData {
    const KIND: EntityKind = EntityKind::Zone;

    fn wrap(entity: Arc<Zone>) -> Entity {
        Entity::Zone(entity)
    }

    fn unwrap(entity: &Entity) -> Option<Arc<Zone>> {
        match entity {
            Entity::Zone(zone) => Some(zone.clone()),
            _ => None,
        }
    }
}
