//! Simulation CLI.
//!
//! Plays seeded random games and writes one JSON resolution report per turn.
//!
//! Usage:
//!   cargo run --release --bin simulate -- [OPTIONS]
//!
//! Options:
//!   --games N       Number of games to play (default: 1)
//!   --players N     Players per game (default: 4)
//!   --characters N  Characters per player (default: 2)
//!   --turns N       Turns per game (default: 10)
//!   --threads N     Number of parallel threads (default: 4)
//!   --seed N        Random seed, 0 for entropy (default: 0)
//!   --config FILE   Engine configuration file (default: regency.toml if present)
//!   --output FILE   Output file path (default: stdout)

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tracing::info;

use regency::config::EngineConfig;
use regency::logging::init_logging;
use regency::simulate::{self, SimulationConfig};

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let mut config = SimulationConfig::default();
    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--help" || flag == "-h" {
            print_usage();
            return Ok(());
        }
        i += 1;
        let value = match args.get(i) {
            Some(v) => v,
            None => bail!("missing value for {}", flag),
        };
        let invalid = || format!("invalid {} value '{}'", flag, value);
        match flag {
            "--games" => config.games = value.parse().with_context(invalid)?,
            "--players" => config.players = value.parse().with_context(invalid)?,
            "--characters" => config.characters = value.parse().with_context(invalid)?,
            "--turns" => config.turns = value.parse().with_context(invalid)?,
            "--threads" => config.threads = value.parse().with_context(invalid)?,
            "--seed" => config.seed = value.parse().with_context(invalid)?,
            "--config" => config_path = Some(PathBuf::from(value)),
            "--output" => output_path = Some(PathBuf::from(value)),
            other => {
                print_usage();
                bail!("unknown argument: {}", other);
            }
        }
        i += 1;
    }

    config.engine = EngineConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!(
        games = config.games,
        players = config.players,
        characters = config.characters,
        turns = config.turns,
        threads = config.threads,
        "simulation starting"
    );

    let start = Instant::now();
    let games = simulate::run_simulation(&config)?;
    info!(elapsed_s = start.elapsed().as_secs_f64(), "simulation complete");

    match output_path {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            simulate::write_jsonl(&games, &mut writer)?;
            writer.flush()?;
            info!(path = %path.display(), "reports written");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            simulate::write_jsonl(&games, &mut writer)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: simulate [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --games N        Number of games to play (default: 1)");
    eprintln!("  --players N      Players per game (default: 4)");
    eprintln!("  --characters N   Characters per player (default: 2)");
    eprintln!("  --turns N        Turns per game (default: 10)");
    eprintln!("  --threads N      Number of parallel threads (default: 4)");
    eprintln!("  --seed N         Random seed, 0 for entropy (default: 0)");
    eprintln!("  --config FILE    Engine configuration file");
    eprintln!("  --output FILE    Output file path (default: stdout)");
    eprintln!("  --help           Show this help");
}
