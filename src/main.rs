//! Regency -- a turn adjudicator driven over stdin/stdout.
//!
//! This binary reads requests from stdin and writes responses to stdout.
//! Usage: `regency [--config <path>]`.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use regency::config::EngineConfig;
use regency::engine::{Engine, Flow};
use regency::logging::init_logging;
use regency::protocol::parser::parse_request;

/// Runs the main protocol loop, reading requests from stdin and writing
/// responses to stdout.
fn main() -> Result<()> {
    init_logging();

    let config_path = parse_args()?;
    let config = EngineConfig::load(config_path.as_deref()).context("loading configuration")?;
    let mut engine = Engine::new(config)?;
    info!("engine ready");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let request = match parse_request(&line) {
            Some(r) => r,
            None => continue,
        };
        if engine.handle(request, &mut out)? == Flow::Quit {
            break;
        }
    }
    out.flush()?;
    Ok(())
}

fn parse_args() -> Result<Option<PathBuf>> {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(None),
        [flag, path] if flag == "--config" => Ok(Some(PathBuf::from(path))),
        _ => bail!("usage: regency [--config <path>]"),
    }
}
