//! Driver protocol handling.
//!
//! Compact notation for commands and orders, and the line parser for the
//! driver binary's main loop.

pub mod notation;
pub mod parser;

pub use notation::{format_command, format_commands, parse_command, parse_commands, NotationError};
pub use parser::{parse_request, RecruitParams, Request};
