//! # hubhud
//!
//! Incremental, resumable sync of community activity into a local DuckDB
//! store: chat-room messages from a rate-limited, cursor-paginated API and
//! repository events from a ClickHouse warehouse.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hubhud::chat::{ChatClient, ChatConnector};
//! use hubhud::database::DuckDbStore;
//! use hubhud::engine::SyncEngine;
//! use hubhud::http::{HttpClient, HttpClientConfig};
//! use hubhud::Resource;
//!
//! #[tokio::main]
//! async fn main() -> hubhud::Result<()> {
//!     let http = HttpClient::with_config(
//!         HttpClientConfig::builder()
//!             .base_url("https://api.gitter.im/v1")
//!             .bearer("token")
//!             .build(),
//!     )?;
//!     let client = ChatClient::new(http);
//!     let room = client.get_room("cloud-custodian/cloud-custodian").await?;
//!
//!     let store = DuckDbStore::open("hud.duckdb")?;
//!     let mut engine = SyncEngine::new(ChatConnector::new(client), store);
//!     let added = engine.sync(&Resource::new(room.id.clone(), room.key())).await?;
//!     println!("{added}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   Connector (chat | warehouse)
//!        │ open(resource, resume point)
//!        ▼
//!   EventSource ── PaginatedEventIterator ── PageSource ── HttpClient
//!        │                                                 (pacing, quota)
//!        ▼
//!   SyncEngine ── dedup ── MicroBatch ── EventStore (DuckDB)
//!        ▲
//!   ResumeCursorResolver (direction + watermark from the store)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Events, directions, resources and watermarks
pub mod types;

/// YAML configuration with environment overrides
pub mod config;

/// HTTP client with pacing and quota handling
pub mod http;

/// Direction-aware cursor pagination
pub mod pagination;

/// Resume-point resolution
pub mod state;

/// Event and room stores
pub mod database;

/// Connector trait
pub mod connector;

/// Sync engine
pub mod engine;

/// Chat rooms and messages
pub mod chat;

/// Repository events from the warehouse
pub mod warehouse;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::HubConfig;
pub use connector::Connector;
pub use engine::{SyncConfig, SyncEngine, SyncStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
