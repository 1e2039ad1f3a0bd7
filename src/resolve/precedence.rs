//! Command precedence table.
//!
//! Within a slot, commands resolve in ascending rank. Kinds that share a
//! rank form one tier and are evaluated simultaneously against the same
//! snapshot. The table is data, so a game can reorder tiers through
//! configuration without touching the resolver.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::order::{CommandKind, ALL_COMMAND_KINDS, COMMAND_KIND_COUNT};

/// Errors raised when building a precedence table from configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrecedenceError {
    #[error("unknown command kind '{0}' in precedence table")]
    UnknownKind(String),
}

/// Rank of every command kind; lower ranks resolve first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecedenceTable {
    ranks: [u8; COMMAND_KIND_COUNT],
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        PrecedenceTable::standard()
    }
}

impl PrecedenceTable {
    /// The standard ordering:
    ///
    /// 0. Hide, Guard
    /// 1. Contest
    /// 2. Assassinate, Theft, Scheme
    /// 3. Bribe, Embargo
    /// 4. Move
    /// 5. Tax, Trade, Income, Train, Study, Govern
    pub fn standard() -> Self {
        let mut ranks = [0u8; COMMAND_KIND_COUNT];
        for kind in ALL_COMMAND_KINDS {
            ranks[kind as usize] = match kind {
                CommandKind::Hide | CommandKind::Guard => 0,
                CommandKind::Contest => 1,
                CommandKind::Assassinate | CommandKind::Theft | CommandKind::Scheme => 2,
                CommandKind::Bribe | CommandKind::Embargo => 3,
                CommandKind::Move => 4,
                CommandKind::Tax
                | CommandKind::Trade
                | CommandKind::Income
                | CommandKind::Train
                | CommandKind::Study
                | CommandKind::Govern => 5,
            };
        }
        PrecedenceTable { ranks }
    }

    /// Starts from the standard table and overrides ranks by kind name.
    pub fn with_overrides(overrides: &BTreeMap<String, u8>) -> Result<Self, PrecedenceError> {
        let mut table = PrecedenceTable::standard();
        for (name, rank) in overrides {
            let kind: CommandKind = name
                .parse()
                .map_err(|_| PrecedenceError::UnknownKind(name.clone()))?;
            table.set_rank(kind, *rank);
        }
        Ok(table)
    }

    pub fn rank(&self, kind: CommandKind) -> u8 {
        self.ranks[kind as usize]
    }

    pub fn set_rank(&mut self, kind: CommandKind, rank: u8) {
        self.ranks[kind as usize] = rank;
    }

    /// Command kinds grouped into tiers, lowest rank first. Kinds inside a
    /// tier keep declaration order.
    pub fn tiers(&self) -> Vec<Vec<CommandKind>> {
        let mut by_rank: BTreeMap<u8, Vec<CommandKind>> = BTreeMap::new();
        for kind in ALL_COMMAND_KINDS {
            by_rank.entry(self.rank(kind)).or_default().push(kind);
        }
        by_rank.into_values().collect()
    }
}
