/// Rooms, their exits and their placement inside a zone

use crate::core::{Contents, Entity, EntityData, EntityKind, Event, Id, Locked};
use crate::network::ansi::{colorize, Color, ColorMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Direction of a room exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Up,
    Down,
}

impl ExitDirection {
    pub const ALL: [ExitDirection; 10] = [
        ExitDirection::North,
        ExitDirection::NorthEast,
        ExitDirection::East,
        ExitDirection::SouthEast,
        ExitDirection::South,
        ExitDirection::SouthWest,
        ExitDirection::West,
        ExitDirection::NorthWest,
        ExitDirection::Up,
        ExitDirection::Down,
    ];

    /// Parse a full name or abbreviation, case-insensitively
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|dir| dir.abbreviation() == text || dir.name().replace(' ', "") == text)
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            ExitDirection::North => "n",
            ExitDirection::NorthEast => "ne",
            ExitDirection::East => "e",
            ExitDirection::SouthEast => "se",
            ExitDirection::South => "s",
            ExitDirection::SouthWest => "sw",
            ExitDirection::West => "w",
            ExitDirection::NorthWest => "nw",
            ExitDirection::Up => "u",
            ExitDirection::Down => "d",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitDirection::North => "north",
            ExitDirection::NorthEast => "north east",
            ExitDirection::East => "east",
            ExitDirection::SouthEast => "south east",
            ExitDirection::South => "south",
            ExitDirection::SouthWest => "south west",
            ExitDirection::West => "west",
            ExitDirection::NorthWest => "north west",
            ExitDirection::Up => "up",
            ExitDirection::Down => "down",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            ExitDirection::North => ExitDirection::South,
            ExitDirection::NorthEast => ExitDirection::SouthWest,
            ExitDirection::East => ExitDirection::West,
            ExitDirection::SouthEast => ExitDirection::NorthWest,
            ExitDirection::South => ExitDirection::North,
            ExitDirection::SouthWest => ExitDirection::NorthEast,
            ExitDirection::West => ExitDirection::East,
            ExitDirection::NorthWest => ExitDirection::SouthEast,
            ExitDirection::Up => ExitDirection::Down,
            ExitDirection::Down => ExitDirection::Up,
        }
    }
}

impl fmt::Display for ExitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of a room inside its zone; north is -y, up is -z
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring coordinate through `direction`
    pub fn next(&self, direction: ExitDirection) -> Self {
        let (dx, dy, dz) = match direction {
            ExitDirection::North => (0, -1, 0),
            ExitDirection::NorthEast => (1, -1, 0),
            ExitDirection::East => (1, 0, 0),
            ExitDirection::SouthEast => (1, 1, 0),
            ExitDirection::South => (0, 1, 0),
            ExitDirection::SouthWest => (-1, 1, 0),
            ExitDirection::West => (-1, 0, 0),
            ExitDirection::NorthWest => (-1, -1, 0),
            ExitDirection::Up => (0, 0, -1),
            ExitDirection::Down => (0, 0, 1),
        };
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomData {
    pub zone_id: Id,
    pub location: Coordinate,
    pub title: String,
    pub description: String,

    #[serde(default)]
    pub exits: BTreeSet<ExitDirection>,

    #[serde(default)]
    pub items: Vec<Id>,
}

impl RoomData {
    pub fn new(zone_id: Id, location: Coordinate) -> Self {
        Self {
            zone_id,
            location,
            title: "The Void".to_string(),
            description: "You are floating in the blackness of space. Complete darkness surrounds you in all directions.".to_string(),
            exits: BTreeSet::new(),
            items: Vec::new(),
        }
    }
}

impl Contents for RoomData {
    fn contents(&self) -> &Vec<Id> {
        &self.items
    }

    fn contents_mut(&mut self) -> &mut Vec<Id> {
        &mut self.items
    }
}

pub type Room = Locked<RoomData>;

impl Room {
    pub fn zone_id(&self) -> Id {
        self.read(|r| r.zone_id)
    }

    pub fn location(&self) -> Coordinate {
        self.read(|r| r.location)
    }

    pub fn title(&self) -> String {
        self.read(|r| r.title.clone())
    }

    pub fn description(&self) -> String {
        self.read(|r| r.description.clone())
    }

    pub fn exits(&self) -> Vec<ExitDirection> {
        self.read(|r| r.exits.iter().copied().collect())
    }

    pub fn has_exit(&self, direction: ExitDirection) -> bool {
        self.read(|r| r.exits.contains(&direction))
    }

    /// Change the title; occupants are told the room changed
    pub fn set_title(self: &Arc<Self>, title: &str) -> bool {
        self.update_with(
            title.trim().to_string(),
            |r| &r.title,
            |r| &mut r.title,
            || Some(Event::RoomUpdated { room: self.clone() }),
        )
    }

    pub fn set_description(self: &Arc<Self>, description: &str) -> bool {
        self.update_with(
            description.trim().to_string(),
            |r| &r.description,
            |r| &mut r.description,
            || Some(Event::RoomUpdated { room: self.clone() }),
        )
    }

    /// Open or close one exit
    pub fn set_exit(self: &Arc<Self>, direction: ExitDirection, enabled: bool) -> bool {
        self.mutate_if(
            |r| r.exits.contains(&direction) != enabled,
            |r| {
                if enabled {
                    r.exits.insert(direction);
                } else {
                    r.exits.remove(&direction);
                }
            },
            || Some(Event::RoomUpdated { room: self.clone() }),
        )
    }

    /// Flip one exit, returning its new state
    pub fn toggle_exit(self: &Arc<Self>, direction: ExitDirection) -> bool {
        let mut enabled = false;
        self.mutate_if(
            |_| true,
            |r| {
                enabled = !r.exits.remove(&direction);
                if enabled {
                    r.exits.insert(direction);
                }
            },
            || Some(Event::RoomUpdated { room: self.clone() }),
        );
        enabled
    }

    /// Render the room as shown to a player
    pub fn describe(
        &self,
        color: ColorMode,
        players: &[String],
        npcs: &[String],
        items: &[String],
    ) -> String {
        let (title, description, exits) =
            self.read(|r| (r.title.clone(), r.description.clone(), r.exits.clone()));

        let mut text = format!(
            "\r\n{}\r\n\r\n{}\r\n",
            colorize(color, Color::White, &format!(">>> {} <<<", title)),
            colorize(color, Color::White, &format!(" {}", description)),
        );

        if !players.is_empty() {
            text.push_str(&format!(
                "\r\n {} {}\r\n",
                colorize(color, Color::Blue, "Also here:"),
                colorize(color, Color::White, &players.join(", "))
            ));
        }

        if !npcs.is_empty() {
            text.push_str(&format!(
                " {} {}\r\n",
                colorize(color, Color::Blue, "NPCs:"),
                colorize(color, Color::White, &npcs.join(", "))
            ));
        }

        if !items.is_empty() {
            text.push_str(&format!(
                " {} {}\r\n",
                colorize(color, Color::Blue, "Items:"),
                colorize(color, Color::White, &items.join(", "))
            ));
        }

        let exit_list = if exits.is_empty() {
            "None".to_string()
        } else {
            exits.iter().map(|dir| dir.abbreviation()).collect::<Vec<_>>().join(" ")
        };
        text.push_str(&format!(
            "\r\n {} {}",
            colorize(color, Color::Blue, "Exits:"),
            colorize(color, Color::White, &exit_list)
        ));

        text
    }
}

impl EntityData for RoomData {
    const KIND: EntityKind = EntityKind::Room;

    fn wrap(entity: Arc<Room>) -> Entity {
        Entity::Room(entity)
    }

    fn unwrap(entity: &Entity) -> Option<Arc<Room>> {
        match entity {
            Entity::Room(room) => Some(room.clone()),
            _ => None,
        }
    }
}
