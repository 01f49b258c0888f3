/// World object types
///
/// Each world object is a `Locked<...Data>`: the data struct holds the
/// persisted fields, the `Locked` wrapper supplies locking and change
/// notification. Cross-object references are ids, resolved through the
/// `EntityStore`.

pub mod character;
pub mod item;
pub mod room;
pub mod zone;

pub use character::{Character, CharacterData};
pub use item::{Item, ItemData, Template, TemplateData};
pub use room::{Coordinate, ExitDirection, Room, RoomData};
pub use zone::{Zone, ZoneData};

use crate::error::{MudError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z' -]{1,23}$").expect("valid name pattern"));

/// Normalize a display name: first letter upper-case, the rest lower-case
pub fn format_name(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Check a player-chosen name and return it formatted
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if !NAME_PATTERN.is_match(trimmed) {
        return Err(MudError::ValidationError {
            field: "name".to_string(),
            reason: "Names are 2-24 letters and must start with a letter".to_string(),
        });
    }
    Ok(format_name(trimmed))
}
