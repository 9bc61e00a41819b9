//! Resume types

use crate::types::{Cursor, Direction, Watermark};
use serde::{Deserialize, Serialize};

/// How a connector resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Backfill Backward on an empty store, then catch up Forward
    Bidirectional,
    /// Always read Forward; the watermark only narrows the lower bound
    ForwardOnly,
}

/// Where a run starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Direction of travel
    pub direction: Direction,
    /// Newest stored event, None on a fresh store
    pub watermark: Option<Watermark>,
}

impl ResumePoint {
    /// A run over an empty store
    pub fn fresh(direction: Direction) -> Self {
        Self {
            direction,
            watermark: None,
        }
    }

    /// Anchor for the first page request
    pub fn cursor(&self) -> Option<Cursor> {
        self.watermark.as_ref().map(|w| w.event_id.clone())
    }

    /// Whether nothing was stored before this run
    pub fn is_fresh(&self) -> bool {
        self.watermark.is_none()
    }
}
