/// Player actions and builder commands
///
/// A session routes every input line to one of two handlers: lines starting
/// with the command prefix go to the `CommandHandler`, everything else to the
/// `ActionHandler`. Handlers run synchronously against the shared world and
/// collect their output in the `Context`; the session writes it afterwards.
///
/// A handler reports a user mistake as `MudError::InvalidInput`, which the
/// session shows to the player and then carries on. Any other error ends the
/// session.

pub mod actions;
pub mod builder;

pub use actions::DefaultActions;
pub use builder::DefaultCommands;

use crate::core::{EntityStore, EventBus, Event};
use crate::error::{MudError, Result};
use crate::network::ansi::{colorize, Color, ColorMode};
use crate::world::{Character, Room, Zone};
use std::sync::Arc;

/// Handles plain input lines
pub trait ActionHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context<'_>, action: &str, args: &[String]) -> Result<()>;
}

/// Handles prefixed input lines; `command` has the prefix removed
pub trait CommandHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context<'_>, command: &str, args: &[String]) -> Result<()>;
}

/// Split a line into whitespace-separated words
pub fn argify(line: &str) -> (String, Vec<String>) {
    let mut words = line.split_whitespace().map(str::to_string);
    let first = words.next().unwrap_or_default();
    (first, words.collect())
}

/// What a handler may see and touch while running one line
pub struct Context<'a> {
    pub store: &'a EntityStore,
    pub bus: &'a EventBus,
    pub character: &'a Arc<Character>,

    /// The session's cached room; handlers that move the character replace it
    pub room: &'a mut Arc<Room>,
    pub zone: &'a mut Arc<Zone>,

    pub color: ColorMode,
    lines: Vec<String>,
}

impl<'a> Context<'a> {
    pub fn new(
        store: &'a EntityStore,
        bus: &'a EventBus,
        character: &'a Arc<Character>,
        room: &'a mut Arc<Room>,
        zone: &'a mut Arc<Zone>,
        color: ColorMode,
    ) -> Self {
        Self {
            store,
            bus,
            character,
            room,
            zone,
            color,
            lines: Vec::new(),
        }
    }

    pub fn print(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    pub fn print_colored(&mut self, color: Color, text: &str) {
        let line = colorize(self.color, color, text);
        self.lines.push(line);
    }

    pub fn publish(&self, event: Event) {
        self.bus.publish(event);
    }

    /// Render the current room as this character sees it
    pub fn print_room(&mut self) -> Result<()> {
        let mut players = Vec::new();
        let mut npcs = Vec::new();
        for other in self.store.characters_in(self.room.id()) {
            if other.id() == self.character.id() {
                continue;
            }
            if other.is_npc() {
                npcs.push(other.name());
            } else if self.bus.is_online(other.id()) {
                players.push(other.name());
            }
        }

        let items = self
            .store
            .items(&self.room.items())?
            .iter()
            .map(|item| item.name(self.store))
            .collect::<Result<Vec<_>>>()?;

        let text = self.room.describe(self.color, &players, &npcs, &items);
        self.print(text);
        Ok(())
    }

    /// Lines produced so far, leaving the buffer empty
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

/// Shorthand for a recoverable user error
pub(crate) fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(MudError::InvalidInput(message.into()))
}
