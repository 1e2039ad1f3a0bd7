//! Compact command notation.
//!
//! A command is its lower-case kind name followed by its targets, separated
//! by single spaces: `move capital harbor`, `guard c7`, `theft p2`. Several
//! commands form an order when joined by `;`, one per slot.

use thiserror::Error;

use crate::order::{Command, CommandKind, MAX_SLOTS};
use crate::world::{CharacterId, PlayerId, Region};

/// Errors that can occur when parsing notation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("empty input")]
    EmptyInput,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("invalid {expected} '{found}'")]
    InvalidTarget { expected: &'static str, found: String },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(&'static str),

    #[error("unexpected trailing input '{0}'")]
    Trailing(String),

    #[error("move from {0} to itself")]
    SameRegion(String),

    #[error("too many commands: {0} (max {max})", max = MAX_SLOTS)]
    TooManyCommands(usize),
}

/// Parses a single command such as `move capital harbor`.
pub fn parse_command(s: &str) -> Result<Command, NotationError> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    let (&head, rest) = tokens.split_first().ok_or(NotationError::EmptyInput)?;
    let kind: CommandKind = head
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| NotationError::UnknownCommand(head.to_string()))?;

    let mut args = Args { tokens: rest, pos: 0 };
    let command = match kind {
        CommandKind::Hide => Command::Hide,
        CommandKind::Tax => Command::Tax,
        CommandKind::Income => Command::Income,
        CommandKind::Train => Command::Train,
        CommandKind::Study => Command::Study,
        CommandKind::Guard => Command::Guard { target: args.character()? },
        CommandKind::Assassinate => Command::Assassinate { target: args.character()? },
        CommandKind::Scheme => Command::Scheme { target: args.character()? },
        CommandKind::Theft => Command::Theft { target: args.player()? },
        CommandKind::Bribe => Command::Bribe { target: args.player()? },
        CommandKind::Contest => Command::Contest { region: args.region()? },
        CommandKind::Embargo => Command::Embargo { region: args.region()? },
        CommandKind::Trade => Command::Trade { region: args.region()? },
        CommandKind::Govern => Command::Govern { region: args.region()? },
        CommandKind::Move => {
            let from = args.region()?;
            let to = args.region()?;
            if from == to {
                return Err(NotationError::SameRegion(from.slug().to_string()));
            }
            Command::Move { from, to }
        }
    };
    args.finish()?;
    Ok(command)
}

struct Args<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> Args<'a> {
    fn next(&mut self, expected: &'static str) -> Result<&'a str, NotationError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(NotationError::UnexpectedEnd(expected))?;
        self.pos += 1;
        Ok(token)
    }

    fn region(&mut self) -> Result<Region, NotationError> {
        let token = self.next("region")?;
        Region::from_slug(&token.to_ascii_lowercase())
            .ok_or_else(|| NotationError::UnknownRegion(token.to_string()))
    }

    fn character(&mut self) -> Result<CharacterId, NotationError> {
        let token = self.next("character")?;
        token.parse().map_err(|_| NotationError::InvalidTarget {
            expected: "character",
            found: token.to_string(),
        })
    }

    fn player(&mut self) -> Result<PlayerId, NotationError> {
        let token = self.next("player")?;
        token.parse().map_err(|_| NotationError::InvalidTarget {
            expected: "player",
            found: token.to_string(),
        })
    }

    fn finish(&self) -> Result<(), NotationError> {
        match self.tokens.get(self.pos..) {
            Some(rest) if !rest.is_empty() => Err(NotationError::Trailing(rest.join(" "))),
            _ => Ok(()),
        }
    }
}

/// Formats a command in canonical notation.
pub fn format_command(command: &Command) -> String {
    let name = command.kind().name();
    match *command {
        Command::Hide | Command::Tax | Command::Income | Command::Train | Command::Study => {
            name.to_string()
        }
        Command::Guard { target }
        | Command::Assassinate { target }
        | Command::Scheme { target } => format!("{} {}", name, target),
        Command::Theft { target } | Command::Bribe { target } => format!("{} {}", name, target),
        Command::Contest { region }
        | Command::Embargo { region }
        | Command::Trade { region }
        | Command::Govern { region } => format!("{} {}", name, region.slug()),
        Command::Move { from, to } => format!("{} {} {}", name, from.slug(), to.slug()),
    }
}

/// Parses `;`-separated commands, one per slot.
pub fn parse_commands(s: &str) -> Result<Vec<Command>, NotationError> {
    let commands = s
        .split(';')
        .map(parse_command)
        .collect::<Result<Vec<_>, _>>()?;
    if commands.len() > MAX_SLOTS {
        return Err(NotationError::TooManyCommands(commands.len()));
    }
    Ok(commands)
}

/// Formats commands joined by ` ; `.
pub fn format_commands(commands: &[Command]) -> String {
    commands.iter().map(format_command).collect::<Vec<_>>().join(" ; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_commands() {
        assert_eq!(parse_command("hide"), Ok(Command::Hide));
        assert_eq!(parse_command("  TAX "), Ok(Command::Tax));
        assert_eq!(parse_command("study"), Ok(Command::Study));
    }

    #[test]
    fn parse_targeted_commands() {
        assert_eq!(parse_command("guard c7"), Ok(Command::Guard { target: CharacterId(7) }));
        assert_eq!(parse_command("theft p2"), Ok(Command::Theft { target: PlayerId(2) }));
        assert_eq!(
            parse_command("move capital harbor"),
            Ok(Command::Move { from: Region::Capital, to: Region::Harbor })
        );
        assert_eq!(parse_command("govern Westmoor"), Ok(Command::Govern { region: Region::Westmoor }));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(parse_command(""), Err(NotationError::EmptyInput));
        assert_eq!(parse_command("fly"), Err(NotationError::UnknownCommand("fly".to_string())));
        assert_eq!(parse_command("move capital"), Err(NotationError::UnexpectedEnd("region")));
        assert_eq!(parse_command("trade atlantis"), Err(NotationError::UnknownRegion("atlantis".to_string())));
        assert_eq!(
            parse_command("guard p2"),
            Err(NotationError::InvalidTarget { expected: "character", found: "p2".to_string() })
        );
        assert_eq!(parse_command("tax now"), Err(NotationError::Trailing("now".to_string())));
        assert_eq!(
            parse_command("move harbor harbor"),
            Err(NotationError::SameRegion("harbor".to_string()))
        );
    }

    #[test]
    fn canonical_text_survives_a_roundtrip() {
        let text = "hide ; guard c7 ; move capital harbor ; theft p2 ; govern capital";
        let commands = parse_commands(text).unwrap();
        assert_eq!(commands.len(), 5);
        assert_eq!(format_commands(&commands), text);
    }

    #[test]
    fn too_many_commands() {
        assert_eq!(
            parse_commands("tax;tax;tax;tax;tax;tax"),
            Err(NotationError::TooManyCommands(6))
        );
    }

    #[test]
    fn empty_slot_is_an_error() {
        assert_eq!(parse_commands("tax ; ; train"), Err(NotationError::EmptyInput));
    }
}
