//! Resume state
//!
//! There is no separate state file: the newest stored event for a resource
//! is the watermark, and the resolver turns it into a direction plus a
//! starting cursor for the next run.

mod resolver;
mod types;

pub use resolver::ResumeCursorResolver;
pub use types::{ResumePoint, ResumePolicy};
