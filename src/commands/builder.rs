/// Default builder commands for editing the world in place

use crate::commands::{invalid, CommandHandler, Context};
use crate::error::Result;
use crate::network::ansi::Color;
use crate::world::ExitDirection;
use tracing::info;

const HELP: &[(&str, &str)] = &[
    ("exit <direction>", "Open or close an exit of this room"),
    ("title <text>", "Set the title of this room"),
    ("description <text>", "Set the description of this room"),
    ("zone [name]", "Show or rename the current zone"),
    ("help", "Show this list"),
];

/// Built-in command set
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCommands;

impl CommandHandler for DefaultCommands {
    fn handle(&self, ctx: &mut Context<'_>, command: &str, args: &[String]) -> Result<()> {
        match command.to_lowercase().as_str() {
            "exit" | "ex" => toggle_exit(ctx, args),
            "title" => set_title(ctx, args),
            "description" | "desc" => set_description(ctx, args),
            "zone" => zone(ctx, args),
            "help" | "?" => {
                help(ctx);
                Ok(())
            }
            other => invalid(format!("Unrecognized command: {}", other)),
        }
    }
}

fn toggle_exit(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let Some(direction) = args.first().and_then(|arg| ExitDirection::parse(arg)) else {
        return invalid("Usage: exit <direction>");
    };

    let enabled = ctx.room.toggle_exit(direction);
    let state = if enabled { "enabled" } else { "disabled" };
    info!("{} {} exit {} of room {}", ctx.character.name(), state, direction, ctx.room.id());

    ctx.print(format!("Exit {} {}", direction, state));
    Ok(())
}

fn set_title(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        return invalid("Usage: title <text>");
    }
    ctx.room.set_title(&args.join(" "));
    ctx.print_room()
}

fn set_description(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        return invalid("Usage: description <text>");
    }
    ctx.room.set_description(&args.join(" "));
    ctx.print_room()
}

fn zone(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        ctx.zone.set_name(&args.join(" "));
    }
    let line = format!("Current zone: {}", ctx.zone.name());
    ctx.print(line);
    Ok(())
}

fn help(ctx: &mut Context<'_>) {
    ctx.print_colored(Color::Cyan, "Commands:");
    for (usage, summary) in HELP {
        ctx.print(format!("  /{:<20} {}", usage, summary));
    }
}
