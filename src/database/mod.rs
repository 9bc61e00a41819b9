//! Local persistence
//!
//! `EventStore` is the seam the sync engine writes through; `RoomStore`
//! backs the room registry. `DuckDbStore` implements both on a single DuckDB
//! file. Unit tests use the in-memory `MemoryStore`.

mod engine;
#[cfg(test)]
mod memory;
mod traits;

pub use engine::DuckDbStore;
#[cfg(test)]
pub(crate) use memory::MemoryStore;
pub use traits::{EventStore, RoomStore};
