//! Order records and the order-set loader.
//!
//! An `Orders` record holds one character's prioritized commands for one
//! turn: slot 1 is mandatory, slots 2 through 5 are optional. The loader
//! gathers every record for a turn into an `OrderSet`, dropping records that
//! do not belong (dead or unknown characters, other turns) and filling in
//! characters who submitted nothing according to the `DefaultOrderPolicy`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::command::{Command, InvalidCommandError};
use crate::world::{CharacterId, TurnId, World};

/// Maximum number of command slots per order.
pub const MAX_SLOTS: usize = 5;

/// One character's orders for one turn.
///
/// Commands are stored as an ordered sequence; the slot index of a command
/// is its position plus one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrdersRecord")]
pub struct Orders {
    pub character: CharacterId,
    pub turn: TurnId,
    commands: Vec<Command>,
}

/// Unchecked serialized form of `Orders`.
#[derive(Deserialize)]
struct OrdersRecord {
    character: CharacterId,
    turn: TurnId,
    commands: Vec<Command>,
}

impl TryFrom<OrdersRecord> for Orders {
    type Error = InvalidCommandError;

    fn try_from(record: OrdersRecord) -> Result<Self, Self::Error> {
        Orders::new(record.character, record.turn, record.commands)
    }
}

impl Orders {
    /// Builds an order record, checking the slot count.
    pub fn new(
        character: CharacterId,
        turn: TurnId,
        commands: Vec<Command>,
    ) -> Result<Self, InvalidCommandError> {
        if commands.is_empty() {
            return Err(InvalidCommandError::NoCommands);
        }
        if commands.len() > MAX_SLOTS {
            return Err(InvalidCommandError::TooManyCommands {
                count: commands.len(),
                max: MAX_SLOTS,
            });
        }
        Ok(Orders { character, turn, commands })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Command in a 1-based slot.
    pub fn slot(&self, slot: usize) -> Option<&Command> {
        slot.checked_sub(1).and_then(|i| self.commands.get(i))
    }
}

/// What happens to living characters who submitted no orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOrderPolicy {
    /// Implicit single-slot `Hide`.
    #[default]
    Hide,
    /// Implicit single-slot `Income`.
    Income,
    /// No implicit orders: loading fails if anyone is missing.
    Require,
}

impl DefaultOrderPolicy {
    /// The implicit command, or `None` when explicit orders are required.
    pub const fn default_command(self) -> Option<Command> {
        match self {
            DefaultOrderPolicy::Hide => Some(Command::Hide),
            DefaultOrderPolicy::Income => Some(Command::Income),
            DefaultOrderPolicy::Require => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DefaultOrderPolicy::Hide => "hide",
            DefaultOrderPolicy::Income => "income",
            DefaultOrderPolicy::Require => "require",
        }
    }

    pub fn from_name(s: &str) -> Option<DefaultOrderPolicy> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hide" => Some(DefaultOrderPolicy::Hide),
            "income" => Some(DefaultOrderPolicy::Income),
            "require" => Some(DefaultOrderPolicy::Require),
            _ => None,
        }
    }
}

/// Living characters had no orders while the policy requires them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("turn {turn} is missing orders for {}", MissingList(.missing))]
pub struct IncompleteOrdersError {
    pub turn: TurnId,
    pub missing: Vec<CharacterId>,
}

struct MissingList<'a>(&'a [CharacterId]);

impl fmt::Display for MissingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// A character's commands as loaded for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterOrders {
    pub character: CharacterId,
    pub commands: Vec<Command>,
    /// True when the commands came from the default policy.
    pub implicit: bool,
}

/// Every living character's commands for one turn, ordered by character id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSet {
    pub turn: TurnId,
    entries: Vec<CharacterOrders>,
}

impl OrderSet {
    pub fn entries(&self) -> &[CharacterOrders] {
        &self.entries
    }

    pub fn get(&self, character: CharacterId) -> Option<&CharacterOrders> {
        self.entries
            .binary_search_by_key(&character, |e| e.character)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Commands in a 1-based slot, in character-id order.
    pub fn slot(&self, slot: usize) -> impl Iterator<Item = (CharacterId, Command)> + '_ {
        self.entries.iter().filter_map(move |e| {
            slot.checked_sub(1)
                .and_then(|i| e.commands.get(i))
                .map(|c| (e.character, *c))
        })
    }

    /// Highest slot number in use.
    pub fn depth(&self) -> usize {
        self.entries.iter().map(|e| e.commands.len()).max().unwrap_or(0)
    }
}

/// Gathers the orders for `turn` into an `OrderSet`.
///
/// Only records for `turn` from living characters of `world` are kept; if a
/// character appears twice the later record wins. Living characters without
/// a record receive the policy's implicit order, or are reported in an
/// `IncompleteOrdersError` under `DefaultOrderPolicy::Require`.
pub fn load_order_set(
    world: &World,
    turn: TurnId,
    submitted: &[Orders],
    policy: DefaultOrderPolicy,
) -> Result<OrderSet, IncompleteOrdersError> {
    let mut by_character: BTreeMap<CharacterId, &Orders> = BTreeMap::new();

    for orders in submitted.iter().filter(|o| o.turn == turn) {
        match world.character(orders.character) {
            Some(c) if c.alive => {
                if by_character.insert(orders.character, orders).is_some() {
                    warn!(character = %orders.character, "duplicate orders; keeping the later record");
                }
            }
            Some(_) => warn!(character = %orders.character, "ignoring orders from a dead character"),
            None => warn!(character = %orders.character, "ignoring orders from an unknown character"),
        }
    }

    let mut entries = Vec::new();
    let mut missing = Vec::new();

    for character in world.living_characters() {
        match by_character.get(&character.id) {
            Some(orders) => entries.push(CharacterOrders {
                character: character.id,
                commands: orders.commands().to_vec(),
                implicit: false,
            }),
            None => match policy.default_command() {
                Some(cmd) => entries.push(CharacterOrders {
                    character: character.id,
                    commands: vec![cmd],
                    implicit: true,
                }),
                None => missing.push(character.id),
            },
        }
    }

    if !missing.is_empty() {
        return Err(IncompleteOrdersError { turn, missing });
    }

    Ok(OrderSet { turn, entries })
}
