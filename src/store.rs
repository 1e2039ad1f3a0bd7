//! Game store.
//!
//! The persistence collaborator of the resolver: an in-memory archive of
//! game records behind a `RwLock`, with JSON snapshots on disk. Order
//! submission is concurrent-safe; once a turn's resolution begins, the turn
//! is fenced (`TurnStatus::Resolving`) and every write to that game is
//! refused until the resolution commits or aborts.

use std::fs;
use std::path::Path;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::order::{Command, DefaultOrderPolicy, InvalidCommandError, Orders, RawCommand};
use crate::resolve::{
    resolve_turn, ResolveError, Resolver, Rules, TurnAlreadyAdvancedError, TurnReport,
};
use crate::world::{
    Character, CharacterId, Game, GameId, Player, PlayerId, Region, Stats, TurnId, TurnStatus,
    UserId, World,
};

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown game {0}")]
    UnknownGame(GameId),

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("unknown character {0}")]
    UnknownCharacter(CharacterId),

    #[error("character {0} is dead")]
    DeadCharacter(CharacterId),

    #[error("user {user} already plays in game {game}")]
    DuplicatePlayer { user: UserId, game: GameId },

    #[error("game {0} has no current turn")]
    NoCurrentTurn(GameId),

    #[error("turn {0} is being resolved")]
    TurnClosed(TurnId),

    #[error("treasury {0} is outside 0..={max}", max = MAX_TREASURY)]
    InvalidTreasury(i64),

    #[error(transparent)]
    InvalidCommand(#[from] InvalidCommandError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed archive: {0}")]
    Json(#[from] serde_json::Error),
}

/// Largest starting treasury a player may be seated with.
pub const MAX_TREASURY: i64 = 1_000_000_000_000;

/// Next-id counters for every table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub game: u64,
    pub player: u32,
    pub character: u32,
    pub turn: u32,
}

/// One game and its submitted orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub world: World,
    #[serde(default)]
    pub orders: Vec<Orders>,
}

/// Everything the store holds; also the on-disk snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    #[serde(default)]
    pub games: Vec<GameRecord>,
    #[serde(default)]
    pub counters: Counters,
}

impl Archive {
    /// Repairs a snapshot for use: tables sorted by id, stats clamped to
    /// `0..=max_stat`, and counters raised past every id already present so
    /// hand-written snapshots without counters never collide.
    fn normalize(&mut self, max_stat: i32) {
        for record in &mut self.games {
            record.world.sort_tables();
            for c in &mut record.world.characters {
                c.stats = c.stats.clamped(max_stat);
            }
            let w = &record.world;
            self.counters.game = self.counters.game.max(w.game.id.0);
            for p in &w.players {
                self.counters.player = self.counters.player.max(p.id.0);
            }
            for c in &w.characters {
                self.counters.character = self.counters.character.max(c.id.0);
            }
            for t in &w.turns {
                self.counters.turn = self.counters.turn.max(t.id.0);
            }
        }
    }

    fn record(&self, game: GameId) -> Result<&GameRecord, StoreError> {
        self.games
            .iter()
            .find(|r| r.world.game.id == game)
            .ok_or(StoreError::UnknownGame(game))
    }

    fn record_mut(&mut self, game: GameId) -> Result<&mut GameRecord, StoreError> {
        self.games
            .iter_mut()
            .find(|r| r.world.game.id == game)
            .ok_or(StoreError::UnknownGame(game))
    }

    fn game_of_player(&self, player: PlayerId) -> Option<GameId> {
        self.games
            .iter()
            .find(|r| r.world.player(player).is_some())
            .map(|r| r.world.game.id)
    }

    fn game_of_character(&self, character: CharacterId) -> Option<GameId> {
        self.games
            .iter()
            .find(|r| r.world.character(character).is_some())
            .map(|r| r.world.game.id)
    }
}

/// Fails if the game's current turn is fenced for resolution.
fn ensure_writable(record: &GameRecord) -> Result<(), StoreError> {
    match record.world.current_turn() {
        Some(t) if t.status == TurnStatus::Resolving => Err(StoreError::TurnClosed(t.id)),
        _ => Ok(()),
    }
}

/// Template for a new character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterSpec {
    pub name: String,
    pub race: String,
    pub stats: Stats,
    pub location: Option<Region>,
}

/// A turn fenced for resolution, with the inputs captured at the fence.
#[derive(Debug, Clone)]
pub struct PendingResolution {
    pub game: GameId,
    pub turn: TurnId,
    next_turn: TurnId,
    world: World,
    orders: Vec<Orders>,
}

/// Thread-safe store of game records.
#[derive(Debug)]
pub struct GameStore {
    archive: RwLock<Archive>,
    /// Cap applied to stats of created and loaded characters.
    max_stat: i32,
}

impl Default for GameStore {
    fn default() -> Self {
        GameStore::with_max_stat(Rules::default().max_stat)
    }
}

impl GameStore {
    pub fn new() -> Self {
        GameStore::default()
    }

    /// An empty store whose characters are capped at `max_stat`.
    pub fn with_max_stat(max_stat: i32) -> Self {
        GameStore { archive: RwLock::new(Archive::default()), max_stat }
    }

    pub fn from_archive(mut archive: Archive, max_stat: i32) -> Self {
        archive.normalize(max_stat);
        GameStore { archive: RwLock::new(archive), max_stat }
    }

    /// Reads a JSON snapshot.
    pub fn load(path: &Path, max_stat: i32) -> Result<Self, StoreError> {
        let data = fs::read_to_string(path)?;
        let archive: Archive = serde_json::from_str(&data)?;
        info!(path = %path.display(), games = archive.games.len(), "archive loaded");
        Ok(GameStore::from_archive(archive, max_stat))
    }

    pub fn max_stat(&self) -> i32 {
        self.max_stat
    }

    /// Changes the cap for characters created from now on.
    pub fn set_max_stat(&mut self, max_stat: i32) {
        self.max_stat = max_stat;
    }

    /// Writes a JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(&*self.archive.read())?;
        fs::write(path, data)?;
        info!(path = %path.display(), "archive saved");
        Ok(())
    }

    pub fn snapshot(&self) -> Archive {
        self.archive.read().clone()
    }

    pub fn world(&self, game: GameId) -> Result<World, StoreError> {
        Ok(self.archive.read().record(game)?.world.clone())
    }

    /// Creates a game with an open first turn.
    pub fn create_game(&self, name: &str) -> GameId {
        let mut archive = self.archive.write();
        archive.counters.game += 1;
        archive.counters.turn += 1;
        let game = Game {
            id: GameId(archive.counters.game),
            name: name.to_string(),
            start_date: Utc::now(),
        };
        let id = game.id;
        let first_turn = TurnId(archive.counters.turn);
        archive.games.push(GameRecord { world: World::new(game, first_turn), orders: Vec::new() });
        info!(game = %id, name, "game created");
        id
    }

    /// Seats a user in a game. A user holds at most one seat per game.
    pub fn add_player(
        &self,
        game: GameId,
        user: UserId,
        name: &str,
        treasury: i64,
    ) -> Result<PlayerId, StoreError> {
        if !(0..=MAX_TREASURY).contains(&treasury) {
            return Err(StoreError::InvalidTreasury(treasury));
        }
        let mut archive = self.archive.write();
        let next = PlayerId(archive.counters.player + 1);
        let record = archive.record_mut(game)?;
        ensure_writable(record)?;
        if record.world.players.iter().any(|p| p.user == user) {
            return Err(StoreError::DuplicatePlayer { user, game });
        }
        record.world.insert_player(Player { id: next, user, name: name.to_string(), treasury });
        archive.counters.player = next.0;
        Ok(next)
    }

    /// Creates a living character for a player, with stats clamped to
    /// `0..=max_stat`.
    pub fn add_character(
        &self,
        player: PlayerId,
        spec: CharacterSpec,
    ) -> Result<CharacterId, StoreError> {
        let mut archive = self.archive.write();
        let game = archive.game_of_player(player).ok_or(StoreError::UnknownPlayer(player))?;
        let next = CharacterId(archive.counters.character + 1);
        let record = archive.record_mut(game)?;
        ensure_writable(record)?;
        let character = Character {
            id: next,
            player,
            name: spec.name,
            race: spec.race,
            alive: true,
            stats: spec.stats.clamped(self.max_stat),
            location: spec.location,
        };
        record.world.insert_character(character);
        archive.counters.character = next.0;
        Ok(next)
    }

    /// Sets a region's controller during game setup.
    pub fn set_controller(
        &self,
        game: GameId,
        region: Region,
        controller: Option<CharacterId>,
    ) -> Result<(), StoreError> {
        let mut archive = self.archive.write();
        let record = archive.record_mut(game)?;
        ensure_writable(record)?;
        if let Some(id) = controller {
            if record.world.character(id).is_none() {
                return Err(StoreError::UnknownCharacter(id));
            }
        }
        record.world.set_controller(region, controller);
        Ok(())
    }

    /// Newest games first.
    pub fn recent_games(&self, limit: usize) -> Vec<Game> {
        let archive = self.archive.read();
        let mut games: Vec<Game> = archive.games.iter().map(|r| r.world.game.clone()).collect();
        games.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        games.truncate(limit);
        games
    }

    /// Validates raw command rows and submits them as the character's orders.
    pub fn submit_raw(
        &self,
        character: CharacterId,
        raw: &[RawCommand],
    ) -> Result<Orders, StoreError> {
        let commands = raw
            .iter()
            .map(RawCommand::validate)
            .collect::<Result<Vec<Command>, _>>()?;
        self.submit_orders(character, commands)
    }

    /// Records a character's orders for its game's current turn, replacing
    /// any earlier submission for that turn.
    pub fn submit_orders(
        &self,
        character: CharacterId,
        commands: Vec<Command>,
    ) -> Result<Orders, StoreError> {
        let mut archive = self.archive.write();
        let game = archive
            .game_of_character(character)
            .ok_or(StoreError::UnknownCharacter(character))?;
        let record = archive.record_mut(game)?;

        if !record.world.character(character).is_some_and(|c| c.alive) {
            warn!(character = %character, "orders rejected from a dead character");
            return Err(StoreError::DeadCharacter(character));
        }
        let turn = record.world.current_turn().ok_or(StoreError::NoCurrentTurn(game))?;
        if turn.status != TurnStatus::Open {
            return Err(StoreError::TurnClosed(turn.id));
        }

        let orders = Orders::new(character, turn.id, commands)?;
        match record
            .orders
            .iter_mut()
            .find(|o| o.character == character && o.turn == turn.id)
        {
            Some(existing) => *existing = orders.clone(),
            None => record.orders.push(orders.clone()),
        }
        Ok(orders)
    }

    /// All orders submitted for a turn.
    pub fn orders_for(&self, game: GameId, turn: TurnId) -> Result<Vec<Orders>, StoreError> {
        let archive = self.archive.read();
        Ok(archive
            .record(game)?
            .orders
            .iter()
            .filter(|o| o.turn == turn)
            .cloned()
            .collect())
    }

    /// Number of turns a character has submitted orders for.
    pub fn character_age(&self, character: CharacterId) -> usize {
        let archive = self.archive.read();
        archive
            .games
            .iter()
            .flat_map(|r| r.orders.iter())
            .filter(|o| o.character == character)
            .count()
    }

    /// Fences the game's current turn and captures its inputs.
    pub fn begin_resolution(&self, game: GameId) -> Result<PendingResolution, StoreError> {
        let mut archive = self.archive.write();
        let next_turn = TurnId(archive.counters.turn + 1);
        let record = archive.record_mut(game)?;
        let turn = *record.world.current_turn().ok_or(StoreError::NoCurrentTurn(game))?;
        if turn.status != TurnStatus::Open {
            return Err(StoreError::TurnClosed(turn.id));
        }
        if let Some(t) = record.world.turn_mut(turn.id) {
            t.status = TurnStatus::Resolving;
        }
        let pending = PendingResolution {
            game,
            turn: turn.id,
            next_turn,
            world: record.world.clone(),
            orders: record.orders.iter().filter(|o| o.turn == turn.id).cloned().collect(),
        };
        archive.counters.turn = next_turn.0;
        info!(game = %game, turn = %turn.id, "resolution started");
        Ok(pending)
    }

    /// Resolves a fenced turn and commits the result, or re-opens the turn
    /// if resolution fails.
    pub fn commit_resolution(
        &self,
        pending: PendingResolution,
        resolver: &Resolver,
        policy: DefaultOrderPolicy,
    ) -> Result<TurnReport, StoreError> {
        let PendingResolution { game, turn, next_turn, mut world, orders } = pending;
        let fence = FenceGuard::new(self, game, turn);
        let result = resolve_turn(&mut world, turn, &orders, resolver, policy, next_turn);
        fence.disarm();

        let mut archive = self.archive.write();
        let record = archive.record_mut(game)?;
        let still_fenced = record
            .world
            .turn(turn)
            .is_some_and(|t| t.current && t.status == TurnStatus::Resolving);

        match result {
            Ok(report) if still_fenced => {
                record.world = world;
                Ok(report)
            }
            Ok(_) => Err(ResolveError::from(TurnAlreadyAdvancedError { turn }).into()),
            Err(e) => {
                warn!(game = %game, turn = %turn, error = %e, "resolution aborted");
                reopen(record, turn);
                Err(e.into())
            }
        }
    }

    /// Lifts the fence without resolving.
    pub fn abort_resolution(&self, pending: PendingResolution) -> Result<(), StoreError> {
        let mut archive = self.archive.write();
        let record = archive.record_mut(pending.game)?;
        reopen(record, pending.turn);
        Ok(())
    }

    /// Fences, resolves, and commits the game's current turn.
    pub fn resolve_current_turn(
        &self,
        game: GameId,
        resolver: &Resolver,
        policy: DefaultOrderPolicy,
    ) -> Result<TurnReport, StoreError> {
        let pending = self.begin_resolution(game)?;
        self.commit_resolution(pending, resolver, policy)
    }
}

/// Re-opens a fenced turn when dropped while armed, so a panicking
/// resolution cannot leave the game stuck in `Resolving`.
struct FenceGuard<'a> {
    store: &'a GameStore,
    game: GameId,
    turn: TurnId,
    armed: bool,
}

impl<'a> FenceGuard<'a> {
    fn new(store: &'a GameStore, game: GameId, turn: TurnId) -> Self {
        FenceGuard { store, game, turn, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FenceGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(game = %self.game, turn = %self.turn, "resolution interrupted; reopening turn");
        if let Ok(record) = self.store.archive.write().record_mut(self.game) {
            reopen(record, self.turn);
        }
    }
}

fn reopen(record: &mut GameRecord, turn: TurnId) {
    if let Some(t) = record.world.turn_mut(turn) {
        if t.status == TurnStatus::Resolving {
            t.status = TurnStatus::Open;
        }
    }
}
