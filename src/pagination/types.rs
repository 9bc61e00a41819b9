//! Pagination types and traits
//!
//! Defines the seams between upstream adapters, the iterator and the engine.

use crate::error::Result;
use crate::types::{Cursor, Direction, SyncEvent};
use async_trait::async_trait;

/// Largest page the chat API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of events requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One page request against a resource's stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// External ID of the resource
    pub resource_id: String,
    /// Direction of travel
    pub direction: Direction,
    /// Anchor event; None means the start of the stream in `direction`
    pub cursor: Option<Cursor>,
    /// Number of events requested
    pub page_size: u32,
}

impl PageRequest {
    /// Query parameters for this request: `limit` plus the direction's anchor
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = &self.cursor {
            params.push((self.direction.query_param(), cursor.clone()));
        }
        params
    }
}

/// An upstream that serves a resource's events one page at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Normalized event type produced by this source
    type Event: SyncEvent;

    /// Fetch one page. An empty page means the end of history in the
    /// requested direction.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Self::Event>>;

    /// Fetch the children of an event (thread replies), oldest first
    async fn fetch_replies(
        &self,
        _resource_id: &str,
        _parent: &Self::Event,
    ) -> Result<Vec<Self::Event>> {
        Ok(Vec::new())
    }
}

/// A lazy sequence of events the sync engine consumes
#[async_trait]
pub trait EventSource: Send {
    /// Event type yielded
    type Event: SyncEvent;

    /// Next event, or None once the sequence is exhausted
    async fn next_event(&mut self) -> Result<Option<Self::Event>>;

    /// Whether the next `next_event` call starts a new upstream fetch.
    ///
    /// Deadlines are only checked at these boundaries.
    fn at_fetch_boundary(&self) -> bool;

    /// Upstream fetches performed so far
    fn pages_fetched(&self) -> usize;
}
