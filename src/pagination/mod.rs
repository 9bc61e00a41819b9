//! Pagination module
//!
//! Turns a page-at-a-time upstream into one ordered, lazily fetched sequence
//! of events.
//!
//! # Overview
//!
//! - `PageSource` - an upstream that answers one page request
//! - `PaginatedEventIterator` - walks a resource's history Forward
//!   (oldest to newest) or Backward (newest to oldest), re-sorting Backward
//!   pages and advancing the cursor to each page's boundary element
//! - `EventSource` - what the sync engine consumes; implemented by the
//!   iterator and by streaming adapters that are not page based

mod iterator;
mod types;

pub use iterator::PaginatedEventIterator;
pub use types::{EventSource, PageRequest, PageSource, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[cfg(test)]
pub(crate) mod mock;
