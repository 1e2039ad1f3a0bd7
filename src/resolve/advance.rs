//! Turn advancement.
//!
//! The only code that flips `Turn::current`. Advancing closes the current
//! turn and appends its successor, so exactly one turn stays current.

use thiserror::Error;

use crate::world::{Turn, TurnId, TurnStatus, World};

/// The turn being advanced is no longer the current one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("turn {turn} is no longer current")]
pub struct TurnAlreadyAdvancedError {
    pub turn: TurnId,
}

/// Closes `turn` and opens its successor under `next_id`.
///
/// Fails without touching the world if `turn` is missing or not current.
pub fn advance_turn(
    world: &mut World,
    turn: TurnId,
    next_id: TurnId,
) -> Result<Turn, TurnAlreadyAdvancedError> {
    let sequence = match world.turn(turn) {
        Some(t) if t.current => t.sequence,
        _ => return Err(TurnAlreadyAdvancedError { turn }),
    };

    if let Some(t) = world.turn_mut(turn) {
        t.current = false;
        t.status = TurnStatus::Resolved;
    }

    let next = Turn {
        id: next_id,
        sequence: sequence + 1,
        current: true,
        status: TurnStatus::Open,
    };
    world.turns.push(next);
    Ok(next)
}

/// Id for the successor turn when the caller has no id allocator.
pub fn next_turn_id(world: &World) -> TurnId {
    TurnId(world.turns.iter().map(|t| t.id.0).max().unwrap_or(0) + 1)
}
