//! Engine session state.
//!
//! Holds the game store, the active configuration, and the resolver built
//! from it, and answers each driver request on an output stream.

use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::order::Command;
use crate::protocol::notation::format_command;
use crate::protocol::parser::{RecruitParams, Request};
use crate::resolve::{LogEntry, Resolver};
use crate::store::{CharacterSpec, GameStore};
use crate::world::{CharacterId, GameId, PlayerId, Region, UserId};

/// What the main loop should do after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Holds the mutable state of the engine between requests.
pub struct Engine {
    pub store: GameStore,
    config: EngineConfig,
    resolver: Resolver,
}

impl Engine {
    /// Creates an engine over an empty store.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let resolver = config.resolver()?;
        let store = GameStore::with_max_stat(config.rules.max_stat);
        Ok(Engine { store, config, resolver })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatches one request.
    pub fn handle<W: Write>(&mut self, request: Request, out: &mut W) -> io::Result<Flow> {
        match request {
            Request::Hello => self.handle_hello(out)?,
            Request::IsReady => self.handle_isready(out)?,
            Request::SetOption { name, value } => {
                self.handle_setoption(&name, value.as_deref().unwrap_or(""), out)?
            }
            Request::NewGame { name } => self.handle_newgame(&name, out)?,
            Request::Join { game, user, treasury, name } => {
                self.handle_join(game, user, treasury, &name, out)?
            }
            Request::Recruit { player, name, params } => {
                self.handle_recruit(player, name, params, out)?
            }
            Request::Control { game, region, character } => {
                self.handle_control(game, region, character, out)?
            }
            Request::Load { path } => self.handle_load(&path, out)?,
            Request::Save { path } => self.handle_save(&path, out)?,
            Request::Orders { character, commands } => {
                self.handle_orders(character, commands, out)?
            }
            Request::Resolve { game } => self.handle_resolve(game, out)?,
            Request::State { game } => self.handle_state(game, out)?,
            Request::Games { limit } => self.handle_games(limit, out)?,
            Request::Quit => return Ok(Flow::Quit),
        }
        out.flush()?;
        Ok(Flow::Continue)
    }

    /// Handles the handshake: writes id, options, and `regencyok`.
    pub fn handle_hello<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "id name regency {}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "id author regency")?;
        writeln!(
            out,
            "option name default_policy type combo default {} var hide var income var require",
            self.config.default_policy.name()
        )?;
        writeln!(
            out,
            "option name recent_games type spin default {} min 1 max 100",
            self.config.recent_games
        )?;
        let rules = &self.config.rules;
        for (name, value) in [
            ("rules.max_stat", rules.max_stat as i64),
            ("rules.tax_per_region", rules.tax_per_region),
            ("rules.trade_rate", rules.trade_rate),
            ("rules.theft_rate", rules.theft_rate),
            ("rules.bribe_cost", rules.bribe_cost),
        ] {
            writeln!(out, "option name {} type spin default {}", name, value)?;
        }
        writeln!(out, "regencyok")
    }

    pub fn handle_isready<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "readyok")
    }

    /// Applies an option and rebuilds the resolver. A rejected option leaves
    /// the previous configuration in place.
    pub fn handle_setoption<W: Write>(&mut self, name: &str, value: &str, out: &mut W) -> io::Result<()> {
        let mut config = self.config.clone();
        let applied = config
            .set_option(name, value)
            .and_then(|_| config.resolver().map_err(ConfigError::from));
        match applied {
            Ok(resolver) => {
                debug!(name, value, "option set");
                self.store.set_max_stat(config.rules.max_stat);
                self.config = config;
                self.resolver = resolver;
                Ok(())
            }
            Err(e) => error(out, e),
        }
    }

    pub fn handle_newgame<W: Write>(&mut self, name: &str, out: &mut W) -> io::Result<()> {
        let game = self.store.create_game(name);
        writeln!(out, "game {}", game)
    }

    pub fn handle_join<W: Write>(
        &mut self,
        game: GameId,
        user: UserId,
        treasury: i64,
        name: &str,
        out: &mut W,
    ) -> io::Result<()> {
        match self.store.add_player(game, user, name, treasury) {
            Ok(player) => writeln!(out, "player {}", player),
            Err(e) => error(out, e),
        }
    }

    pub fn handle_recruit<W: Write>(
        &mut self,
        player: PlayerId,
        name: String,
        params: RecruitParams,
        out: &mut W,
    ) -> io::Result<()> {
        let spec = CharacterSpec {
            name,
            race: params.race,
            stats: params.stats,
            location: params.location,
        };
        match self.store.add_character(player, spec) {
            Ok(character) => writeln!(out, "character {}", character),
            Err(e) => error(out, e),
        }
    }

    pub fn handle_control<W: Write>(
        &mut self,
        game: GameId,
        region: Region,
        character: Option<CharacterId>,
        out: &mut W,
    ) -> io::Result<()> {
        match self.store.set_controller(game, region, character) {
            Ok(()) => writeln!(out, "ok"),
            Err(e) => error(out, e),
        }
    }

    pub fn handle_load<W: Write>(&mut self, path: &Path, out: &mut W) -> io::Result<()> {
        match GameStore::load(path, self.config.rules.max_stat) {
            Ok(store) => {
                let games = store.snapshot().games.len();
                self.store = store;
                writeln!(out, "loaded {}", games)
            }
            Err(e) => error(out, e),
        }
    }

    pub fn handle_save<W: Write>(&self, path: &Path, out: &mut W) -> io::Result<()> {
        match self.store.save(path) {
            Ok(()) => writeln!(out, "saved"),
            Err(e) => error(out, e),
        }
    }

    /// Submits orders; replies `accepted <character> <n>` or `rejected <reason>`.
    pub fn handle_orders<W: Write>(
        &mut self,
        character: CharacterId,
        commands: Vec<Command>,
        out: &mut W,
    ) -> io::Result<()> {
        match self.store.submit_orders(character, commands) {
            Ok(orders) => writeln!(out, "accepted {} {}", character, orders.commands().len()),
            Err(e) => {
                warn!(character = %character, error = %e, "orders rejected");
                writeln!(out, "rejected {}", e)
            }
        }
    }

    /// Resolves a game's current turn and reports every command's outcome.
    pub fn handle_resolve<W: Write>(&mut self, game: GameId, out: &mut W) -> io::Result<()> {
        let report = match self.store.resolve_current_turn(
            game,
            &self.resolver,
            self.config.default_policy,
        ) {
            Ok(r) => r,
            Err(e) => return error(out, e),
        };
        for entry in &report.log {
            writeln!(out, "{}", format_outcome(entry))?;
        }
        info!(game = %game, sequence = report.sequence, "turn reported");
        writeln!(out, "resolved {} {}", game, report.sequence)
    }

    pub fn handle_state<W: Write>(&self, game: GameId, out: &mut W) -> io::Result<()> {
        let world = match self.store.world(game) {
            Ok(w) => w,
            Err(e) => return error(out, e),
        };
        match serde_json::to_string(&world) {
            Ok(json) => writeln!(out, "state {}", json),
            Err(e) => error(out, e),
        }
    }

    /// Lists recent games, newest first.
    pub fn handle_games<W: Write>(&self, limit: Option<usize>, out: &mut W) -> io::Result<()> {
        let games = self.store.recent_games(limit.unwrap_or(self.config.recent_games));
        for game in &games {
            writeln!(out, "game {} {} {}", game.id, game.start_date.to_rfc3339(), game.name)?;
        }
        writeln!(out, "games {}", games.len())
    }
}

fn error<W: Write>(out: &mut W, e: impl std::fmt::Display) -> io::Result<()> {
    writeln!(out, "error {}", e)
}

/// `outcome <slot> <character> <command> <outcome> [reason] [implicit]`.
pub fn format_outcome(entry: &LogEntry) -> String {
    let mut line = format!(
        "outcome {} {} {} {}",
        entry.slot,
        entry.character,
        format_command(&entry.command),
        entry.outcome
    );
    if let Some(reason) = entry.reason {
        line.push_str(&format!(" {}", reason));
    }
    if entry.implicit {
        line.push_str(" implicit");
    }
    line
}
