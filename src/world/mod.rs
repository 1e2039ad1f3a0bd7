//! World representation and game-state types.
//!
//! Contains the core data structures for games, players, characters,
//! regions, and turns.

pub mod character;
pub mod ids;
pub mod region;
pub mod state;

pub use character::{Character, Stat, Stats, ALL_STATS};
pub use ids::{CharacterId, GameId, IdError, PlayerId, TurnId, UserId, GAME_CODE_WIDTH};
pub use region::{Region, ALL_REGIONS, REGION_COUNT};
pub use state::{Game, Player, Turn, TurnStatus, World};
