//! Engine types
//!
//! Configuration, run statistics and the micro-batch buffer.

use crate::types::{Direction, SyncEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Default events per committed micro-batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Events per committed micro-batch
    pub batch_size: usize,
    /// A fetch is only started when at least this much time is left before
    /// the deadline
    pub fetch_margin: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_margin: Duration::ZERO,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size (at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the deadline safety margin
    #[must_use]
    pub fn with_fetch_margin(mut self, margin: Duration) -> Self {
        self.fetch_margin = margin;
        self
    }
}

/// Statistics from one sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    /// Direction the run travelled
    pub direction: Option<Direction>,
    /// Upstream fetches
    pub pages_fetched: usize,
    /// Events yielded by the source
    pub events_seen: usize,
    /// Events already yielded earlier in the same run
    pub duplicates_skipped: usize,
    /// Micro-batches committed
    pub batches_committed: usize,
    /// Rows newly inserted (the run's result)
    pub events_persisted: usize,
    /// Whether the run stopped because the deadline was reached
    pub stopped_at_deadline: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed micro-batch
    pub fn add_batch(&mut self, inserted: usize) {
        self.batches_committed += 1;
        self.events_persisted += inserted;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Events staged for the next commit, plus the time span they cover
pub(crate) struct MicroBatch<E> {
    events: Vec<E>,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    started: Instant,
}

impl<E: SyncEvent> MicroBatch<E> {
    pub(crate) fn new() -> Self {
        Self {
            events: Vec::new(),
            earliest: None,
            latest: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn stage(&mut self, event: E) {
        let at = event.timestamp();
        self.earliest = Some(self.earliest.map_or(at, |e| e.min(at)));
        self.latest = Some(self.latest.map_or(at, |l| l.max(at)));
        self.events.push(event);
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn events(&self) -> &[E] {
        &self.events
    }

    /// Earliest and latest staged timestamps
    pub(crate) fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.earliest.zip(self.latest)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn reset(&mut self) {
        self.events.clear();
        self.earliest = None;
        self.latest = None;
        self.started = Instant::now();
    }
}
