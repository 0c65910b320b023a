//! Per-collection reader/writer locks.
//!
//! Structural operations and document writes take a collection's lock
//! exclusively; reads and retrievals take it shared. Locks for different
//! collections are independent. Each storage backend owns one registry, so
//! every store over the same backend uses the same locks.

use crate::types::CollectionKey;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry handing out one lock per collection key.
///
/// Entries are never removed: a thread still waiting on a dropped
/// collection's lock must contend with whoever recreates it.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: Mutex<HashMap<CollectionKey, Arc<RwLock<()>>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding the given collection.
    pub fn handle(&self, key: &CollectionKey) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Number of collections that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
