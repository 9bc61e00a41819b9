//! Resume cursor resolution

use super::types::{ResumePoint, ResumePolicy};
use crate::database::EventStore;
use crate::error::Result;
use crate::types::{Direction, Resource, SyncEvent};
use tracing::debug;

/// Chooses direction and starting cursor from what is already stored
#[derive(Debug, Clone, Copy)]
pub struct ResumeCursorResolver {
    policy: ResumePolicy,
}

impl ResumeCursorResolver {
    /// Resolver for a connector's policy
    pub fn new(policy: ResumePolicy) -> Self {
        Self { policy }
    }

    /// Resolve the resume point for `resource`.
    ///
    /// An empty store starts a Backward backfill (Forward under
    /// `ForwardOnly`); otherwise the run goes Forward from the newest stored
    /// event.
    pub fn resolve<E, S>(&self, store: &S, resource: &Resource) -> Result<ResumePoint>
    where
        E: SyncEvent,
        S: EventStore<E> + ?Sized,
    {
        let point = match store.latest(&resource.key)? {
            Some(watermark) => ResumePoint {
                direction: Direction::Forward,
                watermark: Some(watermark),
            },
            None => ResumePoint::fresh(match self.policy {
                ResumePolicy::Bidirectional => Direction::Backward,
                ResumePolicy::ForwardOnly => Direction::Forward,
            }),
        };

        debug!(
            "resume {} {} from {:?}",
            resource.key,
            point.direction,
            point.cursor()
        );
        Ok(point)
    }
}
