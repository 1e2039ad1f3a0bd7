//! Command schema.
//!
//! A command arrives as a raw row tuple (kind plus four optional targets)
//! and is validated into a typed `Command` that carries exactly the targets
//! its kind needs. Validation is pure: it only checks that required fields
//! are present and well-formed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{CharacterId, PlayerId, Region};

/// The fifteen command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Hide,
    Guard,
    Contest,
    Assassinate,
    Theft,
    Scheme,
    Bribe,
    Embargo,
    Move,
    Tax,
    Trade,
    Income,
    Train,
    Study,
    Govern,
}

/// Number of command kinds.
pub const COMMAND_KIND_COUNT: usize = 15;

/// All command kinds in declaration order.
pub const ALL_COMMAND_KINDS: [CommandKind; COMMAND_KIND_COUNT] = [
    CommandKind::Hide,
    CommandKind::Guard,
    CommandKind::Contest,
    CommandKind::Assassinate,
    CommandKind::Theft,
    CommandKind::Scheme,
    CommandKind::Bribe,
    CommandKind::Embargo,
    CommandKind::Move,
    CommandKind::Tax,
    CommandKind::Trade,
    CommandKind::Income,
    CommandKind::Train,
    CommandKind::Study,
    CommandKind::Govern,
];

/// A target field of a raw command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PlayerTarget,
    CharacterTarget,
    RegionSource,
    RegionTarget,
}

impl Field {
    pub const fn name(self) -> &'static str {
        match self {
            Field::PlayerTarget => "player_target",
            Field::CharacterTarget => "character_target",
            Field::RegionSource => "region_source",
            Field::RegionTarget => "region_target",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl CommandKind {
    /// Lower-case name used in notation and JSON.
    pub const fn name(self) -> &'static str {
        match self {
            CommandKind::Hide => "hide",
            CommandKind::Guard => "guard",
            CommandKind::Contest => "contest",
            CommandKind::Assassinate => "assassinate",
            CommandKind::Theft => "theft",
            CommandKind::Scheme => "scheme",
            CommandKind::Bribe => "bribe",
            CommandKind::Embargo => "embargo",
            CommandKind::Move => "move",
            CommandKind::Tax => "tax",
            CommandKind::Trade => "trade",
            CommandKind::Income => "income",
            CommandKind::Train => "train",
            CommandKind::Study => "study",
            CommandKind::Govern => "govern",
        }
    }

    /// Fields that must be present for this kind, in notation order.
    pub const fn required_fields(self) -> &'static [Field] {
        match self {
            CommandKind::Hide
            | CommandKind::Tax
            | CommandKind::Income
            | CommandKind::Train
            | CommandKind::Study => &[],
            CommandKind::Guard | CommandKind::Assassinate | CommandKind::Scheme => {
                &[Field::CharacterTarget]
            }
            CommandKind::Theft | CommandKind::Bribe => &[Field::PlayerTarget],
            CommandKind::Contest | CommandKind::Embargo | CommandKind::Trade | CommandKind::Govern => {
                &[Field::RegionTarget]
            }
            CommandKind::Move => &[Field::RegionSource, Field::RegionTarget],
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = InvalidCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ALL_COMMAND_KINDS
            .iter()
            .copied()
            .find(|k| k.name() == lower)
            .ok_or_else(|| InvalidCommandError::UnknownKind(s.to_string()))
    }
}

/// Errors raised when a command or order record is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidCommandError {
    #[error("{kind} requires {field}")]
    MissingField { kind: CommandKind, field: Field },

    #[error("move source and target are both {0:?}")]
    SameRegion(Region),

    #[error("unknown command kind '{0}'")]
    UnknownKind(String),

    #[error("orders must contain at least one command")]
    NoCommands,

    #[error("orders hold at most {max} commands, got {count}")]
    TooManyCommands { count: usize, max: usize },
}

/// A command as stored: the kind plus every optional target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_target: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_target: Option<CharacterId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_source: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_target: Option<Region>,
}

impl RawCommand {
    /// A raw command of the given kind with no targets set.
    pub const fn bare(kind: CommandKind) -> Self {
        RawCommand {
            kind,
            player_target: None,
            character_target: None,
            region_source: None,
            region_target: None,
        }
    }

    /// Checks that the kind's required fields are present and builds the
    /// typed command. Fields the kind does not use are ignored.
    pub fn validate(&self) -> Result<Command, InvalidCommandError> {
        let kind = self.kind;
        let missing = |field: Field| InvalidCommandError::MissingField { kind, field };
        let character = || self.character_target.ok_or_else(|| missing(Field::CharacterTarget));
        let player = || self.player_target.ok_or_else(|| missing(Field::PlayerTarget));
        let region = || self.region_target.ok_or_else(|| missing(Field::RegionTarget));

        let cmd = match kind {
            CommandKind::Hide => Command::Hide,
            CommandKind::Guard => Command::Guard { target: character()? },
            CommandKind::Contest => Command::Contest { region: region()? },
            CommandKind::Assassinate => Command::Assassinate { target: character()? },
            CommandKind::Theft => Command::Theft { target: player()? },
            CommandKind::Scheme => Command::Scheme { target: character()? },
            CommandKind::Bribe => Command::Bribe { target: player()? },
            CommandKind::Embargo => Command::Embargo { region: region()? },
            CommandKind::Move => {
                let from = self.region_source.ok_or_else(|| missing(Field::RegionSource))?;
                let to = region()?;
                if from == to {
                    return Err(InvalidCommandError::SameRegion(from));
                }
                Command::Move { from, to }
            }
            CommandKind::Tax => Command::Tax,
            CommandKind::Trade => Command::Trade { region: region()? },
            CommandKind::Income => Command::Income,
            CommandKind::Train => Command::Train,
            CommandKind::Study => Command::Study,
            CommandKind::Govern => Command::Govern { region: region()? },
        };
        Ok(cmd)
    }
}

/// A validated command.
///
/// Each variant carries exactly the targets its kind requires. Serializes
/// through `RawCommand`, so deserializing a malformed row fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCommand", into = "RawCommand")]
pub enum Command {
    Hide,
    Guard { target: CharacterId },
    Contest { region: Region },
    Assassinate { target: CharacterId },
    Theft { target: PlayerId },
    Scheme { target: CharacterId },
    Bribe { target: PlayerId },
    Embargo { region: Region },
    Move { from: Region, to: Region },
    Tax,
    Trade { region: Region },
    Income,
    Train,
    Study,
    Govern { region: Region },
}

impl Command {
    pub const fn kind(&self) -> CommandKind {
        match self {
            Command::Hide => CommandKind::Hide,
            Command::Guard { .. } => CommandKind::Guard,
            Command::Contest { .. } => CommandKind::Contest,
            Command::Assassinate { .. } => CommandKind::Assassinate,
            Command::Theft { .. } => CommandKind::Theft,
            Command::Scheme { .. } => CommandKind::Scheme,
            Command::Bribe { .. } => CommandKind::Bribe,
            Command::Embargo { .. } => CommandKind::Embargo,
            Command::Move { .. } => CommandKind::Move,
            Command::Tax => CommandKind::Tax,
            Command::Trade { .. } => CommandKind::Trade,
            Command::Income => CommandKind::Income,
            Command::Train => CommandKind::Train,
            Command::Study => CommandKind::Study,
            Command::Govern { .. } => CommandKind::Govern,
        }
    }

    /// The character this command is aimed at, if any.
    pub const fn character_target(&self) -> Option<CharacterId> {
        match self {
            Command::Guard { target } | Command::Assassinate { target } | Command::Scheme { target } => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// The player this command is aimed at, if any.
    pub const fn player_target(&self) -> Option<PlayerId> {
        match self {
            Command::Theft { target } | Command::Bribe { target } => Some(*target),
            _ => None,
        }
    }

    /// The region this command is aimed at, if any.
    pub const fn region_target(&self) -> Option<Region> {
        match self {
            Command::Contest { region }
            | Command::Embargo { region }
            | Command::Trade { region }
            | Command::Govern { region } => Some(*region),
            Command::Move { to, .. } => Some(*to),
            _ => None,
        }
    }

    pub fn to_raw(&self) -> RawCommand {
        let mut raw = RawCommand::bare(self.kind());
        raw.player_target = self.player_target();
        raw.character_target = self.character_target();
        raw.region_target = self.region_target();
        if let Command::Move { from, .. } = self {
            raw.region_source = Some(*from);
        }
        raw
    }
}

impl TryFrom<RawCommand> for Command {
    type Error = InvalidCommandError;

    fn try_from(raw: RawCommand) -> Result<Self, Self::Error> {
        raw.validate()
    }
}

impl From<Command> for RawCommand {
    fn from(cmd: Command) -> Self {
        cmd.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tax_requires_nothing() {
        assert_eq!(RawCommand::bare(CommandKind::Tax).validate(), Ok(Command::Tax));
    }

    #[test]
    fn move_requires_source_then_target() {
        let mut raw = RawCommand::bare(CommandKind::Move);
        assert_eq!(
            raw.validate(),
            Err(InvalidCommandError::MissingField {
                kind: CommandKind::Move,
                field: Field::RegionSource
            })
        );
        raw.region_source = Some(Region::Capital);
        assert_eq!(
            raw.validate(),
            Err(InvalidCommandError::MissingField {
                kind: CommandKind::Move,
                field: Field::RegionTarget
            })
        );
        raw.region_target = Some(Region::Harbor);
        assert_eq!(
            raw.validate(),
            Ok(Command::Move { from: Region::Capital, to: Region::Harbor })
        );
    }

    #[test]
    fn move_rejects_same_region() {
        let mut raw = RawCommand::bare(CommandKind::Move);
        raw.region_source = Some(Region::Westmoor);
        raw.region_target = Some(Region::Westmoor);
        assert_eq!(raw.validate(), Err(InvalidCommandError::SameRegion(Region::Westmoor)));
    }

    #[test]
    fn bribe_requires_player_target() {
        let mut raw = RawCommand::bare(CommandKind::Bribe);
        raw.character_target = Some(CharacterId(1));
        let err = raw.validate().unwrap_err();
        assert_eq!(err.to_string(), "bribe requires player_target");
    }

    #[test]
    fn unused_fields_are_ignored() {
        let mut raw = RawCommand::bare(CommandKind::Hide);
        raw.player_target = Some(PlayerId(4));
        raw.region_target = Some(Region::Harbor);
        assert_eq!(raw.validate(), Ok(Command::Hide));
    }

    #[test]
    fn every_kind_validates_with_its_required_fields() {
        for kind in ALL_COMMAND_KINDS {
            let mut raw = RawCommand::bare(kind);
            for field in kind.required_fields() {
                match field {
                    Field::PlayerTarget => raw.player_target = Some(PlayerId(1)),
                    Field::CharacterTarget => raw.character_target = Some(CharacterId(1)),
                    Field::RegionSource => raw.region_source = Some(Region::Capital),
                    Field::RegionTarget => raw.region_target = Some(Region::Harbor),
                }
            }
            let cmd = raw.validate().unwrap();
            assert_eq!(cmd.kind(), kind);
            assert_eq!(cmd.to_raw(), raw);
        }
    }

    #[test]
    fn kind_names_parse() {
        assert_eq!("Assassinate".parse::<CommandKind>(), Ok(CommandKind::Assassinate));
        assert!(matches!(
            "duel".parse::<CommandKind>(),
            Err(InvalidCommandError::UnknownKind(_))
        ));
    }

    #[test]
    fn command_deserializes_through_validation() {
        let ok: Command =
            serde_json::from_str(r#"{"type":"move","region_source":"capital","region_target":"harbor"}"#)
                .unwrap();
        assert_eq!(ok, Command::Move { from: Region::Capital, to: Region::Harbor });

        let bad = serde_json::from_str::<Command>(r#"{"type":"bribe"}"#);
        assert!(bad.is_err());
    }
}
