//! Resolution output: state effects and the per-command log.
//!
//! Effects record absolute before/after values rather than deltas, so an
//! effect sequence can be re-applied to a state that already contains it
//! without changing anything.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::order::{Command, CommandKind};
use crate::world::{CharacterId, PlayerId, Region, Stat};

/// The outcome of resolving a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The command took effect.
    Success,
    /// Another character's command thwarted it.
    Blocked,
    /// A precondition was not met.
    Failed,
}

impl Outcome {
    pub const fn name(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Blocked => "blocked",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a command did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// The issuing character died earlier in the turn.
    Dead,
    SelfTarget,
    UnknownTarget,
    TargetDead,
    TargetHidden,
    /// The opposing strength was equal or greater.
    Outmatched,
    /// A rival with equal strength ranked ahead on character id.
    LostTieBreak,
    /// The character is not in the move's source region.
    WrongRegion,
    NotInRegion,
    NotController,
    AlreadyController,
    OwnPlayer,
    InsufficientFunds,
    NothingToTake,
    StatAtCap,
    NoRegions,
    Embargoed,
}

impl Reason {
    pub const fn name(self) -> &'static str {
        match self {
            Reason::Dead => "dead",
            Reason::SelfTarget => "self_target",
            Reason::UnknownTarget => "unknown_target",
            Reason::TargetDead => "target_dead",
            Reason::TargetHidden => "target_hidden",
            Reason::Outmatched => "outmatched",
            Reason::LostTieBreak => "lost_tie_break",
            Reason::WrongRegion => "wrong_region",
            Reason::NotInRegion => "not_in_region",
            Reason::NotController => "not_controller",
            Reason::AlreadyController => "already_controller",
            Reason::OwnPlayer => "own_player",
            Reason::InsufficientFunds => "insufficient_funds",
            Reason::NothingToTake => "nothing_to_take",
            Reason::StatAtCap => "stat_at_cap",
            Reason::NoRegions => "no_regions",
            Reason::Embargoed => "embargoed",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A persistent state change produced by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Stat {
        character: CharacterId,
        stat: Stat,
        from: i32,
        to: i32,
    },
    Death {
        character: CharacterId,
    },
    Relocate {
        character: CharacterId,
        from: Option<Region>,
        to: Region,
    },
    Control {
        region: Region,
        from: Option<CharacterId>,
        to: Option<CharacterId>,
    },
    Treasury {
        player: PlayerId,
        from: i64,
        to: i64,
    },
}

/// One resolved command, for audit and player-facing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub slot: u8,
    pub character: CharacterId,
    pub command: Command,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    /// True when the command came from the default-order policy.
    #[serde(default)]
    pub implicit: bool,
}

impl LogEntry {
    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }
}

/// Resolver output for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub log: Vec<LogEntry>,
}

impl Resolution {
    /// Log entries for one character, in resolution order.
    pub fn entries_for(&self, character: CharacterId) -> impl Iterator<Item = &LogEntry> {
        self.log.iter().filter(move |e| e.character == character)
    }

    /// Outcome of a character's command in a slot.
    pub fn outcome(&self, character: CharacterId, slot: u8) -> Option<Outcome> {
        self.log
            .iter()
            .find(|e| e.character == character && e.slot == slot)
            .map(|e| e.outcome)
    }
}
