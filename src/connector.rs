//! Connector trait
//!
//! A connector binds one upstream source to the sync engine: it names the
//! event type, declares how a run resumes, and opens a lazy event sequence
//! for a resource.

use crate::error::Result;
use crate::pagination::EventSource;
use crate::state::{ResumePoint, ResumePolicy};
use crate::types::{Resource, SyncEvent};

// ============================================================================
// Connector Trait
// ============================================================================

/// Source-specific half of a sync
pub trait Connector: Send + Sync {
    /// Normalized event type
    type Event: SyncEvent;

    /// Sequence returned by `open`
    type Source: EventSource<Event = Self::Event>;

    /// Short name used in logs
    fn name(&self) -> &str;

    /// How a run picks its direction and starting point
    fn resume_policy(&self) -> ResumePolicy;

    /// Open an event sequence for `resource` starting at `point`.
    ///
    /// Nothing is fetched until the sequence is first polled.
    fn open(&self, resource: &Resource, point: &ResumePoint) -> Result<Self::Source>;
}
