//! In-memory event store

use super::traits::EventStore;
use crate::error::{Error, Result};
use crate::types::{compare_events, SyncEvent, Watermark};
use std::collections::HashMap;
use std::sync::Mutex;

/// Keeps events in a map per resource; nothing survives the process
pub struct MemoryStore<E> {
    tables: Mutex<HashMap<String, Vec<E>>>,
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }
}

impl<E: SyncEvent> MemoryStore<E> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut HashMap<String, Vec<E>>) -> T) -> Result<T> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::store("memory store lock poisoned"))?;
        Ok(f(&mut tables))
    }
}

impl<E: SyncEvent> EventStore<E> for MemoryStore<E> {
    fn latest(&self, resource_key: &str) -> Result<Option<Watermark>> {
        self.with_tables(|tables| {
            tables
                .get(resource_key)
                .and_then(|events| events.iter().max_by(|a, b| compare_events(*a, *b)))
                .map(Watermark::of)
        })
    }

    fn append(&self, resource_key: &str, events: &[E]) -> Result<usize> {
        self.with_tables(|tables| {
            let table = tables.entry(resource_key.to_string()).or_default();
            let mut inserted = 0;
            for event in events {
                if table.iter().any(|e| e.event_id() == event.event_id()) {
                    continue;
                }
                table.push(event.clone());
                inserted += 1;
            }
            inserted
        })
    }

    fn count(&self, resource_key: &str) -> Result<usize> {
        self.with_tables(|tables| tables.get(resource_key).map_or(0, Vec::len))
    }

    fn event_ids(&self, resource_key: &str) -> Result<Vec<String>> {
        self.with_tables(|tables| {
            let mut events: Vec<&E> = tables
                .get(resource_key)
                .map(|t| t.iter().collect())
                .unwrap_or_default();
            events.sort_by(|a, b| compare_events(*a, *b));
            events.iter().map(|e| e.event_id().to_string()).collect()
        })
    }
}

impl<E> std::fmt::Debug for MemoryStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}
