//! Storage seams used by the sync engine and the room commands

use crate::chat::Room;
use crate::error::Result;
use crate::types::{SyncEvent, Watermark};

/// Persistent, per-resource event table
pub trait EventStore<E: SyncEvent>: Send + Sync {
    /// The most recent stored event for a resource (max timestamp, ties by
    /// ID), or None when nothing is stored yet
    fn latest(&self, resource_key: &str) -> Result<Option<Watermark>>;

    /// Durably insert a micro-batch in one transaction.
    ///
    /// Events whose ID is already stored are skipped. Returns the number of
    /// rows actually inserted.
    fn append(&self, resource_key: &str, events: &[E]) -> Result<usize>;

    /// Number of stored events for a resource
    fn count(&self, resource_key: &str) -> Result<usize>;

    /// Stored event IDs, oldest first
    fn event_ids(&self, resource_key: &str) -> Result<Vec<String>>;
}

/// Registry of chat rooms known locally
pub trait RoomStore: Send + Sync {
    /// Insert or replace a room. Returns true when it was not stored before.
    fn save_room(&self, room: &Room) -> Result<bool>;

    /// Look up a room by its key (URI)
    fn get_room(&self, key: &str) -> Result<Option<Room>>;

    /// All stored rooms ordered by key
    fn list_rooms(&self) -> Result<Vec<Room>>;
}
