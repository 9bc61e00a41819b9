//! Directional cursor iterator
//!
//! Walks one resource's history page by page. Backward pages are re-sorted
//! newest-first; Forward pages are yielded as received. After each page the
//! cursor moves to the most extreme element in the direction of travel.

use super::types::{EventSource, PageRequest, PageSource, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::Result;
use crate::types::{compare_events, Cursor, Direction, SyncEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Lazily fetched, ordered sequence of events for one resource
pub struct PaginatedEventIterator<S: PageSource> {
    source: S,
    resource_id: String,
    direction: Direction,
    cursor: Option<Cursor>,
    page_size: u32,
    expand_threads: bool,
    buffer: VecDeque<S::Event>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<S: PageSource> PaginatedEventIterator<S> {
    /// Create an iterator starting at `cursor` (None = start of stream)
    pub fn new(
        source: S,
        resource_id: impl Into<String>,
        direction: Direction,
        cursor: Option<Cursor>,
    ) -> Self {
        Self {
            source,
            resource_id: resource_id.into(),
            direction,
            cursor,
            page_size: DEFAULT_PAGE_SIZE,
            expand_threads: false,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Set the page size, clamped to `1..=MAX_PAGE_SIZE`
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Yield thread replies right after their parent
    #[must_use]
    pub fn with_thread_expansion(mut self, expand: bool) -> Self {
        self.expand_threads = expand;
        self
    }

    /// Direction of travel
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Cursor the next page will be requested from
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Effective page size
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether an empty page has been seen
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next event in corrected page order
    pub async fn next(&mut self) -> Result<Option<S::Event>> {
        loop {
            if let Some(event) = self.buffer.pop_front() {
                return Ok(Some(event));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> Result<()> {
        let request = PageRequest {
            resource_id: self.resource_id.clone(),
            direction: self.direction,
            cursor: self.cursor.clone(),
            page_size: self.page_size,
        };
        let mut page = self.source.fetch_page(&request).await?;
        self.pages_fetched += 1;

        if page.is_empty() {
            debug!(
                "{} end of history for {} after {} pages",
                self.direction, self.resource_id, self.pages_fetched
            );
            self.exhausted = true;
            return Ok(());
        }

        if self.direction.resorts_page() {
            page.sort_by(|a, b| compare_events(b, a));
        }

        let boundary = self
            .direction
            .boundary_of(&page)
            .map(|event| event.event_id().to_string());

        // Upstream handed back only what sits at (or behind) the cursor, so
        // another request would return the same page forever.
        if boundary.is_some() && boundary == self.cursor {
            warn!(
                "{} page for {} did not advance past cursor {:?}, stopping",
                self.direction, self.resource_id, self.cursor
            );
            self.exhausted = true;
        }
        self.cursor = boundary;

        debug!(
            "fetched {} page {} for {}: {} events, next cursor {:?}",
            self.direction,
            self.pages_fetched,
            self.resource_id,
            page.len(),
            self.cursor
        );

        for event in page {
            let replies = if self.expand_threads && event.reply_count() > 0 {
                self.source.fetch_replies(&self.resource_id, &event).await?
            } else {
                Vec::new()
            };
            self.buffer.push_back(event);
            self.buffer.extend(replies);
        }

        Ok(())
    }
}

#[async_trait]
impl<S: PageSource> EventSource for PaginatedEventIterator<S> {
    type Event = S::Event;

    async fn next_event(&mut self) -> Result<Option<S::Event>> {
        self.next().await
    }

    fn at_fetch_boundary(&self) -> bool {
        self.buffer.is_empty() && !self.exhausted
    }

    fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
