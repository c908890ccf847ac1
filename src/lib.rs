//! Command surface for Lastivka's long-term memory.
//!
//! The engine lives in the `lastivka-memory` crate; this crate adds
//! configuration loading and the `lastivka` subcommands.

pub mod config;
pub mod memory_cli;

pub use config::Config;
pub use memory_cli::{handle_command, MemoryCommands};
