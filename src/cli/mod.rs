//! CLI module
//!
//! Command-line interface for syncing and room management.
//!
//! # Commands
//!
//! - `sync chat` - Sync a chat room's messages
//! - `sync warehouse` - Sync a repository's events from the warehouse
//! - `rooms list` - List rooms visible to the token
//! - `rooms add` - Register a room in the store
//! - `rooms stored` - List registered rooms

mod commands;
mod runner;

pub use commands::{Cli, Commands, RoomsCommand, RunArgs, SyncCommand};
pub use runner::Runner;
