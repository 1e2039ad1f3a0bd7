//! State mutator.
//!
//! Applies a resolved effect sequence to a world. Effects are staged on a
//! copy and committed only if every one of them applies, so a failure never
//! leaves the world half-updated.

use thiserror::Error;

use super::effect::Effect;
use crate::world::{CharacterId, PlayerId, World};

/// An effect referred to a row that does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("effect names unknown character {0}")]
    UnknownCharacter(CharacterId),

    #[error("effect names unknown player {0}")]
    UnknownPlayer(PlayerId),
}

/// Applies every effect or none of them.
pub fn apply_effects(world: &mut World, effects: &[Effect]) -> Result<(), MutationError> {
    let mut staged = world.clone();
    for effect in effects {
        apply_effect(&mut staged, effect)?;
    }
    *world = staged;
    Ok(())
}

/// Writes a single effect's target value into the world.
pub(crate) fn apply_effect(world: &mut World, effect: &Effect) -> Result<(), MutationError> {
    match *effect {
        Effect::Stat { character, stat, to, .. } => {
            character_mut(world, character)?.stats.set(stat, to);
        }
        Effect::Death { character } => {
            character_mut(world, character)?.alive = false;
        }
        Effect::Relocate { character, to, .. } => {
            character_mut(world, character)?.location = Some(to);
        }
        Effect::Control { region, to, .. } => {
            if let Some(id) = to {
                if world.character(id).is_none() {
                    return Err(MutationError::UnknownCharacter(id));
                }
            }
            world.set_controller(region, to);
        }
        Effect::Treasury { player, to, .. } => {
            world
                .player_mut(player)
                .ok_or(MutationError::UnknownPlayer(player))?
                .treasury = to;
        }
    }
    Ok(())
}

fn character_mut(
    world: &mut World,
    id: CharacterId,
) -> Result<&mut crate::world::Character, MutationError> {
    world.character_mut(id).ok_or(MutationError::UnknownCharacter(id))
}
