//! Regency turn adjudicator library.
//!
//! Exposes the world model, order schema, resolver, store, and protocol
//! modules for use by integration tests and the binary entry points.

pub mod config;
pub mod engine;
pub mod logging;
pub mod order;
pub mod protocol;
pub mod resolve;
pub mod simulate;
pub mod store;
pub mod world;
