//! Common types used throughout hubhud
//!
//! This module contains the shared vocabulary of the sync core: traversal
//! direction, resources, watermarks and the `SyncEvent` trait every
//! source-specific record implements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// Type Aliases
// ============================================================================

/// Opaque anchor for the next page request (an event ID)
pub type Cursor = String;

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

// ============================================================================
// Direction
// ============================================================================

/// Direction of travel through a resource's event history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Fetch events newer than the cursor
    Forward,
    /// Fetch events older than the cursor
    Backward,
}

/// Which element of a page anchors the next request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// The newest element by `(timestamp, id)`
    Newest,
    /// The oldest element by `(timestamp, id)`
    Oldest,
}

/// Per-direction metadata
#[derive(Debug)]
struct DirectionRules {
    query_param: &'static str,
    boundary: Boundary,
    resort_descending: bool,
}

const FORWARD: DirectionRules = DirectionRules {
    query_param: "afterId",
    boundary: Boundary::Newest,
    resort_descending: false,
};

const BACKWARD: DirectionRules = DirectionRules {
    query_param: "beforeId",
    boundary: Boundary::Oldest,
    resort_descending: true,
};

impl Direction {
    fn rules(self) -> &'static DirectionRules {
        match self {
            Direction::Forward => &FORWARD,
            Direction::Backward => &BACKWARD,
        }
    }

    /// Query parameter carrying the cursor for this direction
    pub fn query_param(self) -> &'static str {
        self.rules().query_param
    }

    /// Boundary rule used to advance the cursor
    pub fn boundary(self) -> Boundary {
        self.rules().boundary
    }

    /// Whether pages must be re-sorted newest-first before yielding
    pub fn resorts_page(self) -> bool {
        self.rules().resort_descending
    }

    /// Pick the boundary element of a page.
    ///
    /// Selected on the `(timestamp, id)` key rather than by index, so it
    /// holds regardless of how upstream ordered the page.
    pub fn boundary_of<E: SyncEvent>(self, page: &[E]) -> Option<&E> {
        match self.boundary() {
            Boundary::Newest => page.iter().max_by(|a, b| compare_events(*a, *b)),
            Boundary::Oldest => page.iter().min_by(|a, b| compare_events(*a, *b)),
        }
    }

    /// Whether `next` may follow `prev` when walking in this direction
    pub fn in_order<E: SyncEvent>(self, prev: &E, next: &E) -> bool {
        match self {
            Direction::Forward => next.timestamp() >= prev.timestamp(),
            Direction::Backward => next.timestamp() <= prev.timestamp(),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// An immutable, uniquely identified, timestamped record from a source
pub trait SyncEvent: Clone + Send + Sync + 'static {
    /// External ID, unique within the resource's stream
    fn event_id(&self) -> &str;

    /// When the event happened upstream
    fn timestamp(&self) -> DateTime<Utc>;

    /// Number of child events (thread replies) hanging off this one
    fn reply_count(&self) -> u32 {
        0
    }
}

/// Total order over events: timestamp first, ID as tie-break
pub fn compare_events<E: SyncEvent>(a: &E, b: &E) -> Ordering {
    a.timestamp()
        .cmp(&b.timestamp())
        .then_with(|| a.event_id().cmp(b.event_id()))
}

// ============================================================================
// Resources
// ============================================================================

/// An external entity whose event stream is tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Stable external ID used in API paths
    pub id: String,
    /// Human-facing key events are stored under (room URI, project name)
    pub key: String,
}

impl Resource {
    /// Create a new resource
    pub fn new(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }
}

/// Identity and timestamp of the most recently persisted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// ID of the newest stored event
    pub event_id: String,
    /// Its timestamp
    pub timestamp: DateTime<Utc>,
}

impl Watermark {
    /// Create a new watermark
    pub fn new(event_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
        }
    }

    /// Watermark of a single event
    pub fn of<E: SyncEvent>(event: &E) -> Self {
        Self::new(event.event_id(), event.timestamp())
    }
}
