/// Default player actions: looking, moving, talking

use crate::commands::{invalid, ActionHandler, Context};
use crate::core::Event;
use crate::error::Result;
use crate::network::ansi::Color;
use crate::world::ExitDirection;
use tracing::debug;

/// Built-in action set
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActions;

impl ActionHandler for DefaultActions {
    fn handle(&self, ctx: &mut Context<'_>, action: &str, args: &[String]) -> Result<()> {
        let action = action.to_lowercase();

        if let Some(direction) = ExitDirection::parse(&action) {
            return move_character(ctx, direction);
        }

        match action.as_str() {
            "look" | "l" => ctx.print_room(),
            "say" => say(ctx, args),
            "inventory" | "inv" | "i" => inventory(ctx),
            "who" => who(ctx),
            _ => invalid("You can't do that"),
        }
    }
}

fn move_character(ctx: &mut Context<'_>, direction: ExitDirection) -> Result<()> {
    if !ctx.room.has_exit(direction) {
        return invalid("You can't go that way");
    }

    let zone_id = ctx.room.zone_id();
    let destination = ctx.room.location().next(direction);
    let (next, dug) = ctx.store.room_at_or_create(zone_id, destination);
    if dug {
        debug!("Dug new room at {:?} heading {}", destination, direction);
        next.set_exit(direction.opposite(), true);
    }

    let character = ctx.character.clone();
    ctx.publish(Event::Left {
        character: character.clone(),
        room_id: ctx.room.id(),
    });
    character.set_room_id(next.id());
    ctx.publish(Event::Entered {
        character,
        room_id: next.id(),
    });

    *ctx.room = next;
    ctx.print_room()
}

fn say(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        return invalid("Nothing to say");
    }

    let text = args.join(" ");
    ctx.publish(Event::Say {
        speaker: ctx.character.clone(),
        room_id: ctx.room.id(),
        text: text.clone(),
    });
    ctx.print_colored(Color::Yellow, &format!("You say: {}", text));
    Ok(())
}

fn inventory(ctx: &mut Context<'_>) -> Result<()> {
    let items = ctx.store.items(&ctx.character.items())?;
    if items.is_empty() {
        ctx.print("You aren't carrying anything");
        return Ok(());
    }

    ctx.print("You are carrying:");
    for item in items {
        let line = format!("  {}", item.name(ctx.store)?);
        ctx.print(line);
    }
    Ok(())
}

fn who(ctx: &mut Context<'_>) -> Result<()> {
    let mut names: Vec<_> = ctx.bus.online_characters().iter().map(|c| c.name()).collect();
    names.sort();
    names.dedup();

    ctx.print_colored(Color::Cyan, "Online:");
    for name in names {
        ctx.print(format!("  {}", name));
    }
    Ok(())
}
