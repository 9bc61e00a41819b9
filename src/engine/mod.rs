//! Execution engine module
//!
//! Drives one connector's event sequence into an event store.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - resolves where to resume, streams events, drops
//!   in-run duplicates and commits fixed-size micro-batches
//! - `SyncConfig` - batch size and deadline margin
//! - `SyncStats` - counters for the last run, kept after a failure so the
//!   number of events persisted before it can be reported

mod types;

use types::MicroBatch;
pub use types::{SyncConfig, SyncStats, DEFAULT_BATCH_SIZE};

use crate::connector::Connector;
use crate::database::EventStore;
use crate::error::Result;
use crate::pagination::EventSource;
use crate::state::ResumeCursorResolver;
use crate::types::{Direction, Resource, SyncEvent};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sync engine for one connector and store
pub struct SyncEngine<C, S> {
    connector: C,
    store: S,
    config: SyncConfig,
    stats: SyncStats,
}

impl<C, S> SyncEngine<C, S>
where
    C: Connector,
    S: EventStore<C::Event>,
{
    /// Create a new sync engine
    pub fn new(connector: C, store: S) -> Self {
        Self {
            connector,
            store,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Statistics of the most recent run
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// The store events are written to
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Sync `resource` until upstream history is exhausted.
    ///
    /// Returns the number of events newly persisted.
    pub async fn sync(&mut self, resource: &Resource) -> Result<usize> {
        self.run(resource, None).await
    }

    /// Like `sync`, but no new page is fetched once `deadline` is reached.
    ///
    /// Everything committed before stopping stays committed and becomes the
    /// watermark for the next run.
    pub async fn sync_until(&mut self, resource: &Resource, deadline: Instant) -> Result<usize> {
        self.run(resource, Some(deadline)).await
    }

    async fn run(&mut self, resource: &Resource, deadline: Option<Instant>) -> Result<usize> {
        let started = Instant::now();
        self.stats = SyncStats::new();

        let point = ResumeCursorResolver::new(self.connector.resume_policy())
            .resolve::<C::Event, S>(&self.store, resource)?;
        self.stats.direction = Some(point.direction);

        match point.cursor() {
            Some(cursor) => info!(
                "syncing {} {} for {} from {}",
                self.connector.name(),
                point.direction,
                resource.key,
                cursor
            ),
            None => info!(
                "syncing {} {} for {} from the start",
                self.connector.name(),
                point.direction,
                resource.key
            ),
        }

        let mut source = self.connector.open(resource, &point)?;
        let outcome = self.drive(&mut source, resource, deadline).await;

        self.stats.pages_fetched = source.pages_fetched();
        self.stats
            .set_duration(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        outcome?;

        if self.stats.stopped_at_deadline && point.direction == Direction::Backward {
            warn!(
                "backfill of {} stopped at deadline; later runs will not fetch older history",
                resource.key
            );
        }
        info!(
            "finished - added {} {} events for {}",
            self.stats.events_persisted,
            self.connector.name(),
            resource.key
        );
        Ok(self.stats.events_persisted)
    }

    async fn drive(
        &mut self,
        source: &mut C::Source,
        resource: &Resource,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let mut batch = MicroBatch::new();

        loop {
            if source.at_fetch_boundary() && self.deadline_reached(deadline) {
                debug!("deadline reached for {}, not fetching further", resource.key);
                self.stats.stopped_at_deadline = true;
                break;
            }

            let Some(event) = source.next_event().await? else {
                break;
            };
            self.stats.events_seen += 1;

            if !seen.insert(event.event_id().to_string()) {
                self.stats.duplicates_skipped += 1;
                continue;
            }

            batch.stage(event);
            if batch.len() >= self.config.batch_size {
                self.flush(resource, &mut batch)?;
            }
        }

        self.flush(resource, &mut batch)
    }

    fn deadline_reached(&self, deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|d| Instant::now() + self.config.fetch_margin >= d)
    }

    fn flush(&mut self, resource: &Resource, batch: &mut MicroBatch<C::Event>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let inserted = self.store.append(&resource.key, batch.events())?;
        self.stats.add_batch(inserted);

        if let Some((earliest, latest)) = batch.span() {
            info!(
                "sync from {} to {} in {:.2}s ({} new of {})",
                earliest,
                latest,
                batch.elapsed().as_secs_f64(),
                inserted,
                batch.len()
            );
        }
        batch.reset();
        Ok(())
    }
}

impl<C, S> std::fmt::Debug for SyncEngine<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
