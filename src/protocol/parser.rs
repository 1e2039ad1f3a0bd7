//! Driver command parser.
//!
//! Parses incoming driver lines from raw text into structured `Request`
//! variants that the engine main loop can dispatch on.

use std::path::PathBuf;

use tracing::warn;

use crate::order::Command;
use crate::protocol::notation::parse_commands;
use crate::world::{CharacterId, GameId, PlayerId, Region, Stats, UserId};

/// Attributes of a character created with `recruit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecruitParams {
    pub location: Option<Region>,
    pub stats: Stats,
    pub race: String,
}

/// A parsed driver-to-engine request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Protocol handshake.
    Hello,

    /// Synchronization ping; engine must reply `readyok`.
    IsReady,

    /// Set an engine option: `setoption name <id> [value <x>]`.
    SetOption { name: String, value: Option<String> },

    /// Create a game: `newgame <name>`.
    NewGame { name: String },

    /// Seat a user: `join <game> <user> <treasury> <name>`.
    Join { game: GameId, user: UserId, treasury: i64, name: String },

    /// Create a character:
    /// `recruit <player> <name> [at <region>] [race <race>] [stats <m> <i> <c> <f> <ch>]`.
    Recruit { player: PlayerId, name: String, params: RecruitParams },

    /// Assign a region during setup: `control <game> <region> <character|none>`.
    Control { game: GameId, region: Region, character: Option<CharacterId> },

    /// Replace the store with a JSON archive.
    Load { path: PathBuf },

    /// Write the store as a JSON archive.
    Save { path: PathBuf },

    /// Submit a character's orders: `orders <character> <cmd> ; <cmd> ...`.
    Orders { character: CharacterId, commands: Vec<Command> },

    /// Resolve a game's current turn.
    Resolve { game: GameId },

    /// Print a game's world as JSON.
    State { game: GameId },

    /// List recent games: `games [limit]`.
    Games { limit: Option<usize> },

    /// Terminate the engine process.
    Quit,
}

/// Parses a single line of input into a `Request`.
///
/// Returns `None` for empty lines or unrecognized requests. Malformed
/// arguments for known requests also return `None` after logging a warning.
pub fn parse_request(line: &str) -> Option<Request> {
    let trimmed = line.trim();
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let (&head, args) = tokens.split_first()?;

    match head {
        "regency" => Some(Request::Hello),
        "isready" => Some(Request::IsReady),
        "quit" => Some(Request::Quit),

        "setoption" => parse_setoption(&tokens),
        "newgame" => parse_newgame(args),
        "join" => parse_join(args),
        "recruit" => parse_recruit(args),
        "control" => parse_control(args),
        "load" => path_arg("load", args).map(|path| Request::Load { path }),
        "save" => path_arg("save", args).map(|path| Request::Save { path }),
        "orders" => parse_orders(args, trimmed),
        "resolve" => game_arg("resolve", args).map(|game| Request::Resolve { game }),
        "state" => game_arg("state", args).map(|game| Request::State { game }),
        "games" => parse_games(args),

        other => {
            warn!(request = other, "unknown request");
            None
        }
    }
}

/// Parses `setoption name <id> [value <x>]`.
fn parse_setoption(tokens: &[&str]) -> Option<Request> {
    if tokens.len() < 3 || tokens[1] != "name" {
        warn!("malformed setoption: expected 'setoption name <id> [value <x>]'");
        return None;
    }

    let (name, value) = match tokens.iter().position(|&t| t == "value") {
        Some(vi) => {
            let name_parts = &tokens[2..vi];
            if name_parts.is_empty() {
                warn!("malformed setoption: empty name");
                return None;
            }
            let value_parts = &tokens[vi + 1..];
            let value = (!value_parts.is_empty()).then(|| value_parts.join(" "));
            (name_parts.join(" "), value)
        }
        None => (tokens[2..].join(" "), None),
    };

    Some(Request::SetOption { name, value })
}

fn parse_newgame(args: &[&str]) -> Option<Request> {
    if args.is_empty() {
        warn!("malformed newgame: expected 'newgame <name>'");
        return None;
    }
    Some(Request::NewGame { name: args.join(" ") })
}

fn parse_join(args: &[&str]) -> Option<Request> {
    if args.len() < 4 {
        warn!("malformed join: expected 'join <game> <user> <treasury> <name>'");
        return None;
    }
    let game = parse_arg("game", args[0])?;
    let user = parse_arg("user", args[1])?;
    let treasury = parse_arg("treasury", args[2])?;
    Some(Request::Join { game, user, treasury, name: args[3..].join(" ") })
}

/// Parses `recruit <player> <name> [at <region>] [race <race>] [stats <m> <i> <c> <f> <ch>]`.
fn parse_recruit(args: &[&str]) -> Option<Request> {
    if args.len() < 2 {
        warn!("malformed recruit: expected 'recruit <player> <name> ...'");
        return None;
    }
    let player = parse_arg("player", args[0])?;
    let name = args[1].to_string();
    let mut params = RecruitParams::default();
    let mut i = 2;

    while i < args.len() {
        match args[i] {
            "at" => {
                i += 1;
                params.location = Some(region_arg(args.get(i).copied()?)?);
            }
            "race" => {
                i += 1;
                params.race = args.get(i)?.to_string();
            }
            "stats" => {
                let values = args.get(i + 1..i + 6).or_else(|| {
                    warn!("malformed recruit: stats needs five values");
                    None
                })?;
                let mut v = [0i32; 5];
                for (slot, token) in v.iter_mut().zip(values) {
                    *slot = parse_arg("stat", token)?;
                }
                params.stats = Stats::new(v[0], v[1], v[2], v[3], v[4]);
                i += 5;
            }
            other => {
                warn!(parameter = other, "unknown recruit parameter");
            }
        }
        i += 1;
    }

    Some(Request::Recruit { player, name, params })
}

fn parse_control(args: &[&str]) -> Option<Request> {
    if args.len() != 3 {
        warn!("malformed control: expected 'control <game> <region> <character|none>'");
        return None;
    }
    let game = parse_arg("game", args[0])?;
    let region = region_arg(args[1])?;
    let character = match args[2] {
        "none" => None,
        token => Some(parse_arg("character", token)?),
    };
    Some(Request::Control { game, region, character })
}

/// Parses `orders <character> <notation>`; everything after the character
/// is notation.
fn parse_orders(args: &[&str], full_line: &str) -> Option<Request> {
    if args.len() < 2 {
        warn!("malformed orders: expected 'orders <character> <cmd> ; ...'");
        return None;
    }
    let character = parse_arg("character", args[0])?;
    let notation = full_line
        .strip_prefix("orders")?
        .trim_start()
        .strip_prefix(args[0])?
        .trim();
    match parse_commands(notation) {
        Ok(commands) => Some(Request::Orders { character, commands }),
        Err(e) => {
            warn!(error = %e, "malformed orders");
            None
        }
    }
}

fn parse_games(args: &[&str]) -> Option<Request> {
    let limit = match args.first() {
        Some(token) => Some(parse_arg("limit", token)?),
        None => None,
    };
    Some(Request::Games { limit })
}

fn game_arg(request: &str, args: &[&str]) -> Option<GameId> {
    match args {
        [token] => parse_arg("game", token),
        _ => {
            warn!(request, "expected a single game id");
            None
        }
    }
}

fn path_arg(request: &str, args: &[&str]) -> Option<PathBuf> {
    if args.is_empty() {
        warn!(request, "expected a path");
        return None;
    }
    Some(PathBuf::from(args.join(" ")))
}

fn region_arg(token: &str) -> Option<Region> {
    let region = Region::from_slug(&token.to_ascii_lowercase());
    if region.is_none() {
        warn!(region = token, "unknown region");
    }
    region
}

fn parse_arg<T: std::str::FromStr>(what: &str, token: &str) -> Option<T> {
    match token.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(value = token, "invalid {}", what);
            None
        }
    }
}
