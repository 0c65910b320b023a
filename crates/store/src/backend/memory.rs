//! In-memory storage backend.
//!
//! Suitable for tests and ephemeral agent memory. All state lives behind a
//! single `parking_lot::RwLock`, so every write is atomic with respect to
//! concurrent readers.

use crate::backend::StorageBackend;
use crate::locks::CollectionLocks;
use crate::types::{Collection, CollectionKey, Document};
use parking_lot::RwLock;
use recall_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashMap};

/// Documents of one collection, ordered by insertion sequence.
#[derive(Debug)]
struct CollectionData {
    descriptor: Collection,
    created_seq: u64,
    next_seq: u64,
    order: BTreeMap<u64, Document>,
    positions: HashMap<String, u64>,
}

impl CollectionData {
    /// Descriptor with the live document count filled in.
    fn snapshot(&self) -> Collection {
        let mut collection = self.descriptor.clone();
        collection.document_count = self.order.len();
        collection
    }

    fn new(descriptor: Collection, created_seq: u64) -> Self {
        Self {
            descriptor,
            created_seq,
            next_seq: 0,
            order: BTreeMap::new(),
            positions: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<CollectionKey, CollectionData>,
    next_collection_seq: u64,
}

/// Process-local backend keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    inner: RwLock<Inner>,
    locks: CollectionLocks,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(key: &CollectionKey) -> AppError {
    AppError::collection_not_found(&key.to_string())
}

impl StorageBackend for InMemoryBackend {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn collection_locks(&self) -> &CollectionLocks {
        &self.locks
    }

    fn collection_exists(&self, key: &CollectionKey) -> AppResult<bool> {
        Ok(self.inner.read().collections.contains_key(key))
    }

    fn get_collection(&self, key: &CollectionKey) -> AppResult<Option<Collection>> {
        Ok(self
            .inner
            .read()
            .collections
            .get(key)
            .map(CollectionData::snapshot))
    }

    fn create_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()> {
        let mut inner = self.inner.write();
        if inner.collections.contains_key(key) {
            return Err(AppError::AlreadyExists(format!("collection '{}'", key)));
        }

        let seq = inner.next_collection_seq;
        inner.next_collection_seq += 1;
        inner
            .collections
            .insert(key.clone(), CollectionData::new(collection.clone(), seq));
        Ok(())
    }

    fn update_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()> {
        let mut inner = self.inner.write();
        let data = inner.collections.get_mut(key).ok_or_else(|| missing(key))?;
        data.descriptor = collection.clone();
        Ok(())
    }

    fn drop_collection(&self, key: &CollectionKey) -> AppResult<bool> {
        Ok(self.inner.write().collections.remove(key).is_some())
    }

    fn list_collections(&self, partition: &str) -> AppResult<Vec<Collection>> {
        let inner = self.inner.read();
        let mut found: Vec<&CollectionData> = inner
            .collections
            .iter()
            .filter(|(key, _)| key.partition == partition)
            .map(|(_, data)| data)
            .collect();
        found.sort_by_key(|data| data.created_seq);

        Ok(found.into_iter().map(CollectionData::snapshot).collect())
    }

    fn contains_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool> {
        let inner = self.inner.read();
        let data = inner.collections.get(key).ok_or_else(|| missing(key))?;
        Ok(data.positions.contains_key(id))
    }

    fn get_document(&self, key: &CollectionKey, id: &str) -> AppResult<Option<Document>> {
        let inner = self.inner.read();
        let data = inner.collections.get(key).ok_or_else(|| missing(key))?;
        Ok(data
            .positions
            .get(id)
            .and_then(|seq| data.order.get(seq))
            .cloned())
    }

    fn put_document(&self, key: &CollectionKey, document: &Document) -> AppResult<()> {
        let mut inner = self.inner.write();
        let data = inner.collections.get_mut(key).ok_or_else(|| missing(key))?;

        let seq = match data.positions.get(&document.id) {
            Some(seq) => *seq,
            None => {
                let seq = data.next_seq;
                data.next_seq += 1;
                data.positions.insert(document.id.clone(), seq);
                seq
            }
        };
        data.order.insert(seq, document.clone());
        Ok(())
    }

    fn delete_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool> {
        let mut inner = self.inner.write();
        let data = inner.collections.get_mut(key).ok_or_else(|| missing(key))?;

        match data.positions.remove(id) {
            Some(seq) => {
                data.order.remove(&seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn scan(&self, key: &CollectionKey) -> AppResult<Vec<Document>> {
        let inner = self.inner.read();
        let data = inner.collections.get(key).ok_or_else(|| missing(key))?;
        Ok(data.order.values().cloned().collect())
    }

    fn count_documents(&self, key: &CollectionKey) -> AppResult<usize> {
        let inner = self.inner.read();
        let data = inner.collections.get(key).ok_or_else(|| missing(key))?;
        Ok(data.order.len())
    }
}
