//! Tests for engine module

use super::*;
use crate::database::{EventStore, MemoryStore};
use crate::error::Error;
use crate::pagination::mock::{ev, ScriptedSource, TestEvent};
use crate::pagination::PaginatedEventIterator;
use crate::state::{ResumePoint, ResumePolicy};
use pretty_assertions::assert_eq;
use std::time::Duration;

/// Connector over a scripted page source
struct ScriptedConnector {
    source: ScriptedSource,
    policy: ResumePolicy,
    page_size: u32,
}

impl ScriptedConnector {
    fn new(source: ScriptedSource) -> Self {
        Self {
            source,
            policy: ResumePolicy::Bidirectional,
            page_size: 2,
        }
    }
}

impl Connector for ScriptedConnector {
    type Event = TestEvent;
    type Source = PaginatedEventIterator<ScriptedSource>;

    fn name(&self) -> &str {
        "scripted"
    }

    fn resume_policy(&self) -> ResumePolicy {
        self.policy
    }

    fn open(&self, resource: &Resource, point: &ResumePoint) -> Result<Self::Source> {
        Ok(PaginatedEventIterator::new(
            self.source.clone(),
            resource.id.clone(),
            point.direction,
            point.cursor(),
        )
        .with_page_size(self.page_size))
    }
}

fn resource() -> Resource {
    Resource::new("room-1", "org/project")
}

fn engine(
    source: &ScriptedSource,
    batch_size: usize,
) -> SyncEngine<ScriptedConnector, MemoryStore<TestEvent>> {
    SyncEngine::new(ScriptedConnector::new(source.clone()), MemoryStore::new())
        .with_config(SyncConfig::new().with_batch_size(batch_size))
}

// ============================================================================
// SyncConfig Tests
// ============================================================================

#[test]
fn test_sync_config_default() {
    let config = SyncConfig::default();
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.fetch_margin, Duration::ZERO);
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_batch_size(0)
        .with_fetch_margin(Duration::from_secs(30));
    assert_eq!(config.batch_size, 1);
    assert_eq!(config.fetch_margin, Duration::from_secs(30));
}

// ============================================================================
// Resume Tests
// ============================================================================

#[tokio::test]
async fn test_fresh_backfill_then_forward_catch_up() {
    let source = ScriptedSource::with_pages(vec![
        vec![ev("3", 30), ev("4", 40)],
        vec![ev("1", 10), ev("2", 20)],
    ]);
    let mut engine = engine(&source, 100);

    assert_eq!(engine.sync(&resource()).await.unwrap(), 4);
    assert_eq!(engine.stats().direction, Some(Direction::Backward));
    assert_eq!(engine.stats().pages_fetched, 3);
    assert_eq!(engine.stats().batches_committed, 1);
    assert_eq!(
        engine.store().event_ids("org/project").unwrap(),
        vec!["1", "2", "3", "4"]
    );

    // Second run resumes Forward from the newest stored event.
    source.push_page(vec![ev("5", 50)]);
    assert_eq!(engine.sync(&resource()).await.unwrap(), 1);
    assert_eq!(engine.stats().direction, Some(Direction::Forward));

    let forward: Vec<_> = source.requests()[3..]
        .iter()
        .map(|r| (r.direction, r.cursor.clone()))
        .collect();
    assert_eq!(
        forward,
        vec![
            (Direction::Forward, Some("4".to_string())),
            (Direction::Forward, Some("5".to_string())),
        ]
    );

    // Nothing new upstream.
    assert_eq!(engine.sync(&resource()).await.unwrap(), 0);
    assert_eq!(engine.store().count("org/project").unwrap(), 5);
}

#[tokio::test]
async fn test_forward_only_policy_on_empty_store() {
    let source = ScriptedSource::with_pages(vec![vec![ev("1", 10)]]);
    let mut connector = ScriptedConnector::new(source.clone());
    connector.policy = ResumePolicy::ForwardOnly;
    let mut engine = SyncEngine::new(connector, MemoryStore::new());

    assert_eq!(engine.sync(&resource()).await.unwrap(), 1);
    let first = &source.requests()[0];
    assert_eq!(first.direction, Direction::Forward);
    assert_eq!(first.cursor, None);
}

// ============================================================================
// Batching Tests
// ============================================================================

#[tokio::test]
async fn test_commits_every_batch_size_events() {
    let source = ScriptedSource::with_pages(vec![
        vec![ev("1", 10), ev("2", 20)],
        vec![ev("3", 30), ev("4", 40)],
        vec![ev("5", 50)],
    ]);
    let mut engine = engine(&source, 2);
    engine.connector.policy = ResumePolicy::ForwardOnly;

    assert_eq!(engine.sync(&resource()).await.unwrap(), 5);
    assert_eq!(engine.stats().batches_committed, 3);
    assert_eq!(engine.stats().events_seen, 5);
}

#[tokio::test]
async fn test_failure_keeps_committed_batches() {
    let source = ScriptedSource::with_pages(vec![
        vec![ev("3", 30), ev("4", 40)],
        vec![ev("1", 10), ev("2", 20)],
    ])
    .fail_on_request(2);
    let mut engine = engine(&source, 2);

    let err = engine.sync(&resource()).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 500, .. }));

    assert_eq!(engine.stats().events_persisted, 2);
    assert_eq!(engine.store().event_ids("org/project").unwrap(), vec!["3", "4"]);
    assert_eq!(
        engine.store().latest("org/project").unwrap().unwrap().event_id,
        "4"
    );
}

#[tokio::test]
async fn test_failure_drops_only_the_open_batch() {
    let source =
        ScriptedSource::with_pages(vec![vec![ev("3", 30), ev("4", 40)]]).fail_on_request(2);
    let mut engine = engine(&source, 100);

    assert!(engine.sync(&resource()).await.is_err());
    assert_eq!(engine.stats().events_persisted, 0);
    assert_eq!(engine.store().count("org/project").unwrap(), 0);
}

// ============================================================================
// Dedup Tests
// ============================================================================

#[tokio::test]
async fn test_overlapping_pages_are_deduplicated() {
    let source = ScriptedSource::with_pages(vec![
        vec![ev("1", 10), ev("2", 20)],
        vec![ev("2", 20), ev("3", 30)],
    ]);
    let mut engine = engine(&source, 100);
    engine.connector.policy = ResumePolicy::ForwardOnly;

    assert_eq!(engine.sync(&resource()).await.unwrap(), 3);
    assert_eq!(engine.stats().duplicates_skipped, 1);
    assert_eq!(engine.stats().events_seen, 4);
}

#[tokio::test]
async fn test_replayed_events_are_not_counted() {
    let source = ScriptedSource::with_pages(vec![vec![ev("2", 20), ev("3", 30)]]);
    let mut engine = engine(&source, 100);
    engine
        .store()
        .append("org/project", &[ev("1", 10), ev("2", 20)])
        .unwrap();

    // Upstream includes the cursor event itself; only "3" is new.
    assert_eq!(engine.sync(&resource()).await.unwrap(), 1);
    assert_eq!(source.requests()[0].cursor.as_deref(), Some("2"));
    assert_eq!(engine.store().count("org/project").unwrap(), 3);
}

// ============================================================================
// Deadline Tests
// ============================================================================

#[tokio::test]
async fn test_expired_deadline_fetches_nothing() {
    let source = ScriptedSource::with_pages(vec![vec![ev("1", 10)]]);
    let mut engine = engine(&source, 100);

    let count = engine.sync_until(&resource(), Instant::now()).await.unwrap();

    assert_eq!(count, 0);
    assert!(engine.stats().stopped_at_deadline);
    assert!(source.requests().is_empty());
}

#[tokio::test]
async fn test_fetch_margin_counts_against_deadline() {
    let source = ScriptedSource::with_pages(vec![vec![ev("1", 10)]]);
    let mut engine = SyncEngine::new(ScriptedConnector::new(source.clone()), MemoryStore::new())
        .with_config(SyncConfig::new().with_fetch_margin(Duration::from_secs(60)));

    let deadline = Instant::now() + Duration::from_secs(30);
    assert_eq!(engine.sync_until(&resource(), deadline).await.unwrap(), 0);
    assert!(source.requests().is_empty());
}

#[tokio::test]
async fn test_deadline_mid_run_keeps_fetched_pages() {
    let source = ScriptedSource::with_pages(vec![
        vec![ev("5", 50), ev("6", 60)],
        vec![ev("3", 30), ev("4", 40)],
        vec![ev("1", 10), ev("2", 20)],
    ])
    .with_latency(Duration::from_millis(200));
    let mut engine = engine(&source, 3);

    // Checked before page 1 (t=0) and page 2 (t~200ms); expired before page 3.
    let deadline = Instant::now() + Duration::from_millis(300);
    let count = engine.sync_until(&resource(), deadline).await.unwrap();

    assert_eq!(count, 4);
    assert!(engine.stats().stopped_at_deadline);
    assert_eq!(engine.stats().pages_fetched, 2);
    assert_eq!(engine.stats().batches_committed, 2);
    assert_eq!(source.requests().len(), 2);
    assert_eq!(
        engine.store().event_ids("org/project").unwrap(),
        vec!["3", "4", "5", "6"]
    );

    // The next run resumes Forward from the newest committed event.
    source.set_pages(vec![vec![ev("7", 70)]]);
    assert_eq!(engine.sync(&resource()).await.unwrap(), 1);
    assert_eq!(engine.stats().direction, Some(Direction::Forward));
    let resumed = &source.requests()[2];
    assert_eq!(resumed.direction, Direction::Forward);
    assert_eq!(resumed.cursor.as_deref(), Some("6"));
}

#[tokio::test]
async fn test_distant_deadline_runs_to_completion() {
    let source = ScriptedSource::with_pages(vec![vec![ev("1", 10), ev("2", 20)]]);
    let mut engine = engine(&source, 100);

    let deadline = Instant::now() + Duration::from_secs(600);
    assert_eq!(engine.sync_until(&resource(), deadline).await.unwrap(), 2);
    assert!(!engine.stats().stopped_at_deadline);
}

// ============================================================================
// MicroBatch Tests
// ============================================================================

#[test]
fn test_micro_batch_span() {
    let mut batch = MicroBatch::new();
    assert!(batch.span().is_none());

    batch.stage(ev("b", 20));
    batch.stage(ev("a", 10));
    batch.stage(ev("c", 30));

    let (earliest, latest) = batch.span().unwrap();
    assert_eq!(earliest.timestamp(), 10);
    assert_eq!(latest.timestamp(), 30);
    assert_eq!(batch.len(), 3);

    batch.reset();
    assert!(batch.is_empty());
    assert!(batch.span().is_none());
}
