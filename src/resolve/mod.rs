//! Turn resolution.
//!
//! Loads a turn's orders, resolves conflicts slot by slot, applies the
//! resulting effects, and advances to the next turn. `resolve_turn` does
//! all of it against a staged copy of the world and commits only when every
//! step succeeds.

pub mod advance;
pub mod conflict;
pub mod effect;
pub mod mutate;
pub mod precedence;

pub use advance::{advance_turn, next_turn_id, TurnAlreadyAdvancedError};
pub use conflict::{resolve_orders, Resolver, Rules};
pub use effect::{Effect, LogEntry, Outcome, Reason, Resolution};
pub use mutate::{apply_effects, MutationError};
pub use precedence::{PrecedenceError, PrecedenceTable};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::order::{load_order_set, DefaultOrderPolicy, IncompleteOrdersError, Orders};
use crate::world::{GameId, Turn, TurnId, World};

/// Any failure that aborts a turn's resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error(transparent)]
    IncompleteOrders(#[from] IncompleteOrdersError),

    #[error(transparent)]
    TurnAlreadyAdvanced(#[from] TurnAlreadyAdvancedError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("unknown turn {0}")]
    UnknownTurn(TurnId),
}

/// Everything a resolved turn produced, for storage and presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub game: GameId,
    pub turn: TurnId,
    pub sequence: u32,
    pub next_turn: Turn,
    pub effects: Vec<Effect>,
    pub log: Vec<LogEntry>,
}

/// Resolves `turn` and advances the world past it.
///
/// On error the world is left exactly as it was.
pub fn resolve_turn(
    world: &mut World,
    turn: TurnId,
    submitted: &[Orders],
    resolver: &Resolver,
    policy: DefaultOrderPolicy,
    next_id: TurnId,
) -> Result<TurnReport, ResolveError> {
    let current = world.turn(turn).copied().ok_or(ResolveError::UnknownTurn(turn))?;
    if !current.current {
        return Err(TurnAlreadyAdvancedError { turn }.into());
    }

    let orders = load_order_set(world, turn, submitted, policy)?;
    let resolution = resolver.resolve(&orders, world)?;

    let mut staged = world.clone();
    apply_effects(&mut staged, &resolution.effects)?;
    let next_turn = advance_turn(&mut staged, turn, next_id)?;
    *world = staged;

    info!(
        game = %world.game.id,
        turn = %turn,
        sequence = current.sequence,
        commands = resolution.log.len(),
        effects = resolution.effects.len(),
        "turn resolved"
    );

    Ok(TurnReport {
        game: world.game.id,
        turn,
        sequence: current.sequence,
        next_turn,
        effects: resolution.effects,
        log: resolution.log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Command;
    use crate::world::{Character, CharacterId, Game, Player, PlayerId, Region, Stats, UserId};
    use chrono::Utc;

    fn world() -> World {
        let mut w = World::new(
            Game { id: GameId(1), name: "g".to_string(), start_date: Utc::now() },
            TurnId(1),
        );
        w.insert_player(Player { id: PlayerId(1), user: UserId(1), name: "p".to_string(), treasury: 0 });
        w.insert_character(
            Character::new(CharacterId(1), PlayerId(1), "a")
                .with_stats(Stats::new(1, 1, 1, 4, 1))
                .at(Region::Capital),
        );
        w
    }

    #[test]
    fn resolve_turn_applies_and_advances() {
        let mut w = world();
        let orders = vec![Orders::new(CharacterId(1), TurnId(1), vec![Command::Income]).unwrap()];
        let report = resolve_turn(
            &mut w,
            TurnId(1),
            &orders,
            &Resolver::default(),
            DefaultOrderPolicy::Hide,
            TurnId(2),
        )
        .unwrap();
        assert_eq!(report.sequence, 1);
        assert_eq!(report.next_turn.sequence, 2);
        assert_eq!(w.player(PlayerId(1)).unwrap().treasury, 4);
        assert_eq!(w.current_turn().unwrap().id, TurnId(2));
    }

    #[test]
    fn stale_turn_is_rejected() {
        let mut w = world();
        resolve_turn(&mut w, TurnId(1), &[], &Resolver::default(), DefaultOrderPolicy::Hide, TurnId(2))
            .unwrap();
        let err = resolve_turn(
            &mut w,
            TurnId(1),
            &[],
            &Resolver::default(),
            DefaultOrderPolicy::Hide,
            TurnId(3),
        )
        .unwrap_err();
        assert_eq!(err, ResolveError::TurnAlreadyAdvanced(TurnAlreadyAdvancedError { turn: TurnId(1) }));
    }

    #[test]
    fn incomplete_orders_leave_world_untouched() {
        let mut w = world();
        let before = w.clone();
        let err = resolve_turn(
            &mut w,
            TurnId(1),
            &[],
            &Resolver::default(),
            DefaultOrderPolicy::Require,
            TurnId(2),
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::IncompleteOrders(_)));
        assert_eq!(w, before);
    }

    #[test]
    fn unknown_turn() {
        let mut w = world();
        assert_eq!(
            resolve_turn(&mut w, TurnId(7), &[], &Resolver::default(), DefaultOrderPolicy::Hide, TurnId(8)),
            Err(ResolveError::UnknownTurn(TurnId(7)))
        );
    }
}
