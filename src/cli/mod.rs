//! Command-line interface
//!
//! Argument parsing for the node binary. Every command works on the sled
//! database in the data directory and prints JSON.

pub mod commands;

pub use commands::{Command, Opt};
