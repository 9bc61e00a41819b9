//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

/// Sync chat rooms and repository activity into a local store
#[derive(Parser, Debug)]
#[command(name = "hubhud")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// DuckDB file events are stored in
    #[arg(long, global = true, env = "HUD_DB")]
    pub db: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Minimum log level for the subscriber
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync events from a source into the store
    #[command(subcommand)]
    Sync(SyncCommand),

    /// Discover and register chat rooms
    #[command(subcommand)]
    Rooms(RoomsCommand),
}

/// Sources that can be synced
#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Sync a chat room's messages
    Chat {
        #[command(flatten)]
        run: RunArgs,

        /// Fetch thread replies after their parent message
        #[arg(long)]
        expand_threads: bool,
    },

    /// Sync a repository's events from the warehouse
    Warehouse {
        #[command(flatten)]
        run: RunArgs,

        /// Store events under this repository name instead of the project's
        #[arg(long)]
        rename: Option<String>,
    },
}

/// Options shared by every sync
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Project (room URI or `owner/repo`)
    #[arg(short, long, env = "HUB_PROJECT")]
    pub project: String,

    /// Stop fetching after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Events per committed batch
    #[arg(long)]
    pub batch_size: Option<usize>,
}

/// Room registry commands
#[derive(Subcommand, Debug)]
pub enum RoomsCommand {
    /// List rooms visible to the token
    List {
        /// Only rooms of this type (e.g. ORG, REPO)
        #[arg(long)]
        room_type: Option<String>,

        /// Only rooms whose name contains this text
        #[arg(long)]
        name: Option<String>,
    },

    /// Look a room up upstream and store it
    Add {
        /// Room URI
        #[arg(short, long, env = "HUB_PROJECT")]
        project: String,
    },

    /// List rooms already stored
    Stored,
}
