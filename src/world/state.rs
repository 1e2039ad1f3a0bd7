//! Game world representation.
//!
//! Holds the complete snapshot of one game: its players, characters,
//! region control, and turn rows. Collections are kept sorted by id so
//! iteration order (and therefore resolution order) is deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::character::Character;
use super::ids::{CharacterId, GameId, PlayerId, TurnId, UserId};
use super::region::{Region, ALL_REGIONS, REGION_COUNT};

/// A game of Regency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub name: String,
    pub start_date: DateTime<Utc>,
}

/// A user's seat in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub user: UserId,
    pub name: String,
    #[serde(default)]
    pub treasury: i64,
}

/// Lifecycle of a turn row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// Accepting orders.
    Open,
    /// Resolution has started; submissions are fenced off.
    Resolving,
    /// Resolved and superseded by its successor.
    Resolved,
}

/// One round of simultaneous submission and resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub sequence: u32,
    pub current: bool,
    pub status: TurnStatus,
}

/// Complete state of one game at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub game: Game,
    pub players: Vec<Player>,
    pub characters: Vec<Character>,
    /// Controlling character of each region, indexed by `Region as usize`.
    pub control: [Option<CharacterId>; REGION_COUNT],
    pub turns: Vec<Turn>,
}

impl World {
    /// Creates a world with no players and a single open first turn.
    pub fn new(game: Game, first_turn: TurnId) -> Self {
        World {
            game,
            players: Vec::new(),
            characters: Vec::new(),
            control: [None; REGION_COUNT],
            turns: vec![Turn {
                id: first_turn,
                sequence: 1,
                current: true,
                status: TurnStatus::Open,
            }],
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.players[i])
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        match self.players.binary_search_by_key(&id, |p| p.id) {
            Ok(i) => Some(&mut self.players[i]),
            Err(_) => None,
        }
    }

    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.characters[i])
    }

    pub fn character_mut(&mut self, id: CharacterId) -> Option<&mut Character> {
        match self.characters.binary_search_by_key(&id, |c| c.id) {
            Ok(i) => Some(&mut self.characters[i]),
            Err(_) => None,
        }
    }

    /// Inserts a player, keeping the list sorted. Returns false on a duplicate id.
    pub fn insert_player(&mut self, player: Player) -> bool {
        match self.players.binary_search_by_key(&player.id, |p| p.id) {
            Ok(_) => false,
            Err(i) => {
                self.players.insert(i, player);
                true
            }
        }
    }

    /// Inserts a character, keeping the list sorted. Returns false on a
    /// duplicate id or an unknown owning player.
    pub fn insert_character(&mut self, character: Character) -> bool {
        if self.player(character.player).is_none() {
            return false;
        }
        match self.characters.binary_search_by_key(&character.id, |c| c.id) {
            Ok(_) => false,
            Err(i) => {
                self.characters.insert(i, character);
                true
            }
        }
    }

    pub fn living_characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter().filter(|c| c.alive)
    }

    pub fn controller(&self, region: Region) -> Option<CharacterId> {
        self.control[region as usize]
    }

    pub fn set_controller(&mut self, region: Region, controller: Option<CharacterId>) {
        self.control[region as usize] = controller;
    }

    /// Regions controlled by a character, in region order.
    pub fn regions_controlled_by(&self, id: CharacterId) -> Vec<Region> {
        ALL_REGIONS
            .iter()
            .copied()
            .filter(|r| self.control[*r as usize] == Some(id))
            .collect()
    }

    /// The turn currently marked current, if exactly one is.
    pub fn current_turn(&self) -> Option<&Turn> {
        let mut current = self.turns.iter().filter(|t| t.current);
        match (current.next(), current.next()) {
            (Some(t), None) => Some(t),
            _ => None,
        }
    }

    pub fn turn(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn turn_mut(&mut self, id: TurnId) -> Option<&mut Turn> {
        self.turns.iter_mut().find(|t| t.id == id)
    }

    /// Number of turns marked current. Anything other than 1 is corrupt.
    pub fn current_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.current).count()
    }

    /// Restores the id ordering lookups rely on, e.g. after deserializing a
    /// hand-edited snapshot.
    pub fn sort_tables(&mut self) {
        self.players.sort_by_key(|p| p.id);
        self.characters.sort_by_key(|c| c.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::character::Stats;

    #[test]
    fn sort_tables_restores_lookups() {
        let mut w = world();
        for id in [3, 1, 2] {
            w.characters.push(Character::new(CharacterId(id), PlayerId(1), "x"));
            w.players.push(Player {
                id: PlayerId(id),
                user: UserId(id),
                name: "p".to_string(),
                treasury: 0,
            });
        }
        w.sort_tables();
        for id in 1..=3 {
            assert!(w.character(CharacterId(id)).is_some());
            assert!(w.player(PlayerId(id)).is_some());
        }
    }

    fn world() -> World {
        let game = Game {
            id: GameId(1),
            name: "Test".to_string(),
            start_date: Utc::now(),
        };
        World::new(game, TurnId(1))
    }

    fn player(id: u32) -> Player {
        Player {
            id: PlayerId(id),
            user: UserId(id),
            name: format!("Player {}", id),
            treasury: 0,
        }
    }

    #[test]
    fn new_world_has_one_current_turn() {
        let w = world();
        assert_eq!(w.current_turn_count(), 1);
        let t = w.current_turn().unwrap();
        assert_eq!(t.sequence, 1);
        assert_eq!(t.status, TurnStatus::Open);
    }

    #[test]
    fn inserts_stay_sorted() {
        let mut w = world();
        assert!(w.insert_player(player(3)));
        assert!(w.insert_player(player(1)));
        assert!(!w.insert_player(player(1)));
        let ids: Vec<u32> = w.players.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3]);

        assert!(w.insert_character(Character::new(CharacterId(9), PlayerId(1), "B")));
        assert!(w.insert_character(Character::new(CharacterId(2), PlayerId(3), "A")));
        assert!(!w.insert_character(Character::new(CharacterId(5), PlayerId(7), "orphan")));
        assert_eq!(w.characters[0].id, CharacterId(2));
        assert!(w.character(CharacterId(9)).is_some());
        assert!(w.character(CharacterId(5)).is_none());
    }

    #[test]
    fn region_control_lookup() {
        let mut w = world();
        w.insert_player(player(1));
        w.insert_character(
            Character::new(CharacterId(1), PlayerId(1), "A").with_stats(Stats::new(1, 1, 1, 1, 1)),
        );
        w.set_controller(Region::Harbor, Some(CharacterId(1)));
        w.set_controller(Region::Capital, Some(CharacterId(1)));
        assert_eq!(
            w.regions_controlled_by(CharacterId(1)),
            vec![Region::Capital, Region::Harbor]
        );
        assert_eq!(w.controller(Region::Westmoor), None);
    }

    #[test]
    fn two_current_turns_is_not_a_current_turn() {
        let mut w = world();
        w.turns.push(Turn {
            id: TurnId(2),
            sequence: 2,
            current: true,
            status: TurnStatus::Open,
        });
        assert_eq!(w.current_turn_count(), 2);
        assert!(w.current_turn().is_none());
    }

    #[test]
    fn world_json_roundtrip() {
        let mut w = world();
        w.insert_player(player(1));
        w.insert_character(Character::new(CharacterId(1), PlayerId(1), "A").at(Region::Capital));
        w.set_controller(Region::Capital, Some(CharacterId(1)));
        let json = serde_json::to_string(&w).unwrap();
        let back: World = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
