/// Entity identifiers
///
/// An `Id` names one logical entity for its whole lifetime, independent of
/// where (or whether) it is loaded in memory. Entities refer to each other
/// only through ids resolved by the `EntityStore`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable, globally unique entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The type of world object an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Character,
    Room,
    Zone,
    Item,
    Template,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Character,
        EntityKind::Room,
        EntityKind::Zone,
        EntityKind::Item,
        EntityKind::Template,
    ];

    /// Lowercase name, also used as the storage directory for the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Room => "room",
            EntityKind::Zone => "zone",
            EntityKind::Item => "item",
            EntityKind::Template => "template",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let uuid = Uuid::new_v4();
        let id = Id::from(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn test_kind_names() {
        let names: Vec<_> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["character", "room", "zone", "item", "template"]);
        assert_eq!(
            serde_json::to_string(&EntityKind::Template).unwrap(),
            "\"template\""
        );
    }
}
