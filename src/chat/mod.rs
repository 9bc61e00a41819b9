//! Chat rooms and messages
//!
//! - `ChatClient` - rooms, message pages (`beforeId` / `afterId`) and threads
//! - `ChatMessage`, `Room` - records validated on decode
//! - `ChatConnector` - Backward backfill, then Forward catch-up

mod client;
mod connector;
mod models;

pub use client::ChatClient;
pub use connector::ChatConnector;
pub use models::{ChatMessage, Room};

#[cfg(test)]
pub(crate) mod fixtures;
