//! Integration tests for the regency binary.
//!
//! Tests full protocol sessions by spawning the engine process, sending
//! requests via stdin, and verifying stdout responses.

use std::io::{BufRead, Write};
use std::process::{Command, Stdio};

/// Sends a sequence of requests to the engine and collects stdout lines.
fn run_engine(requests: &[&str]) -> Vec<String> {
    let exe = env!("CARGO_BIN_EXE_regency");
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(exe)
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to start regency");

    let mut stdin = child.stdin.take().unwrap();
    let stdout = child.stdout.take().unwrap();
    let reader = std::io::BufReader::new(stdout);

    for request in requests {
        writeln!(stdin, "{}", request).unwrap();
    }
    stdin.flush().unwrap();
    drop(stdin);

    let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
    let status = child.wait().expect("failed to wait on child");
    assert!(status.success());
    lines
}

/// Two players, one character each, both eyeing Westmoor.
const SETUP: &[&str] = &[
    "newgame Border War",
    "join 000001 u1 40 Anna",
    "join 000001 u2 40 Bors",
    "recruit p1 Aldric at capital stats 5 1 1 2 1",
    "recruit p2 Brenna at harbor stats 3 1 1 2 1",
];

fn with_setup(rest: &[&str]) -> Vec<String> {
    let mut requests: Vec<&str> = SETUP.to_vec();
    requests.extend_from_slice(rest);
    run_engine(&requests)
}

#[test]
fn handshake() {
    let lines = run_engine(&["regency", "quit"]);
    assert!(lines[0].starts_with("id name regency"));
    assert!(lines.iter().any(|l| l == "id author regency"));
    assert_eq!(lines.last().map(String::as_str), Some("regencyok"));

    let options: Vec<&String> = lines.iter().filter(|l| l.starts_with("option ")).collect();
    assert!(!options.is_empty());
    for opt in options {
        assert!(opt.contains(" type "), "option line missing type: {}", opt);
    }
}

#[test]
fn isready_response() {
    let lines = run_engine(&["isready", "quit"]);
    assert_eq!(lines, vec!["readyok"]);
}

#[test]
fn unknown_and_empty_lines_are_ignored() {
    let lines = run_engine(&["foobar", "", "   ", "orders", "isready", "quit"]);
    assert_eq!(lines, vec!["readyok"]);
}

#[test]
fn setup_replies_with_ids() {
    let lines = with_setup(&["quit"]);
    assert_eq!(lines, vec!["game 000001", "player p1", "player p2", "character c1", "character c2"]);
}

#[test]
fn duplicate_join_is_an_error() {
    let lines = with_setup(&["join 000001 u1 40 Again", "quit"]);
    assert!(lines.last().unwrap().starts_with("error user u1 already plays"));
}

#[test]
fn stronger_mover_takes_the_region() {
    let lines = with_setup(&[
        "orders c1 move capital westmoor",
        "orders c2 move harbor westmoor",
        "resolve 000001",
        "quit",
    ]);
    assert!(lines.contains(&"accepted c1 1".to_string()));
    assert!(lines.contains(&"outcome 1 c1 move capital westmoor success".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("outcome 1 c2 move harbor westmoor blocked")));
    assert_eq!(lines.last().unwrap(), "resolved 000001 1");
}

#[test]
fn missing_orders_default_to_hide() {
    let lines = with_setup(&["orders c1 train", "resolve 000001", "quit"]);
    assert!(lines.contains(&"outcome 1 c2 hide success implicit".to_string()));
}

#[test]
fn require_policy_blocks_resolution() {
    let lines = with_setup(&[
        "setoption name default_policy value require",
        "orders c1 train",
        "resolve 000001",
        "isready",
        "quit",
    ]);
    assert!(lines
        .iter()
        .any(|l| l.starts_with("error turn") && l.contains("missing orders for c2")));
    assert!(!lines.iter().any(|l| l.starts_with("resolved")));
}

#[test]
fn sequence_advances_each_resolution() {
    let lines = with_setup(&["resolve 000001", "resolve 000001", "resolve 000001", "quit"]);
    let resolved: Vec<&String> = lines.iter().filter(|l| l.starts_with("resolved ")).collect();
    assert_eq!(resolved, vec!["resolved 000001 1", "resolved 000001 2", "resolved 000001 3"]);
}

#[test]
fn state_is_one_line_of_json() {
    let lines = with_setup(&["state 000001", "quit"]);
    let json = lines.last().unwrap().strip_prefix("state ").unwrap();
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value["game"]["name"], "Border War");
    assert_eq!(value["characters"].as_array().unwrap().len(), 2);
}

#[test]
fn games_lists_newest_first() {
    let lines = run_engine(&["newgame one", "newgame two", "games", "quit"]);
    let listed: Vec<&String> = lines.iter().filter(|l| l.starts_with("game 00000")).collect();
    // Both `newgame` replies and both listing lines start with "game <id>".
    assert_eq!(listed.len(), 4);
    assert!(listed[2].starts_with("game 000002"));
    assert!(listed[3].starts_with("game 000001"));
    assert_eq!(lines.last().unwrap(), "games 2");
}

#[test]
fn save_then_load_restores_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("archive.json");
    let save = format!("save {}", path.display());
    let lines = with_setup(&["orders c1 study", &save, "quit"]);
    assert_eq!(lines.last().unwrap(), "saved");

    let load = format!("load {}", path.display());
    let lines = run_engine(&[&load, "resolve 000001", "quit"]);
    assert_eq!(lines[0], "loaded 1");
    assert!(lines.contains(&"outcome 1 c1 study success".to_string()));
    assert_eq!(lines.last().unwrap(), "resolved 000001 1");
}
