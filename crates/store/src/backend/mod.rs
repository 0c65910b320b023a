//! Storage backend abstraction.
//!
//! A backend persists collection descriptors and documents keyed by
//! [`CollectionKey`] (partition + collection name) and document id. The store
//! holds it as `Arc<dyn StorageBackend>`, so in-memory, file-based and remote
//! implementations are interchangeable.

pub mod envelope;
pub mod memory;
pub mod sqlite;

pub use memory::InMemoryBackend;
pub use sqlite::SqliteBackend;

use crate::locks::CollectionLocks;
use crate::types::{Collection, CollectionKey, Document};
use recall_core::AppResult;

/// Trait for storage backends.
///
/// Implementations must guarantee:
/// - Each single-document write is atomic; readers never see a torn document
/// - `scan` returns documents in first-insertion order, and overwriting a
///   document keeps its position
/// - Document operations on a missing collection fail with `NotFound`
/// - Dropping a collection removes its documents in the same step
/// - `collection_locks` returns the same registry on every call, so every
///   store sharing this backend serializes on the same collection locks
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Short backend identifier used in logs (e.g., "memory", "sqlite").
    fn backend_name(&self) -> &str;

    /// Per-collection locks shared by every store using this backend.
    fn collection_locks(&self) -> &CollectionLocks;

    /// Check whether a collection exists.
    fn collection_exists(&self, key: &CollectionKey) -> AppResult<bool>;

    /// Read a collection descriptor.
    fn get_collection(&self, key: &CollectionKey) -> AppResult<Option<Collection>>;

    /// Create a collection. Fails with `AlreadyExists` if one is present.
    fn create_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()>;

    /// Replace the descriptor of an existing collection.
    fn update_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()>;

    /// Drop a collection and every document in it.
    ///
    /// Returns whether the collection existed.
    fn drop_collection(&self, key: &CollectionKey) -> AppResult<bool>;

    /// List the collections of a partition in creation order.
    fn list_collections(&self, partition: &str) -> AppResult<Vec<Collection>>;

    /// Check whether a document exists.
    fn contains_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool>;

    /// Point read of a document.
    fn get_document(&self, key: &CollectionKey, id: &str) -> AppResult<Option<Document>>;

    /// Insert a document, or overwrite it in place if the id exists.
    fn put_document(&self, key: &CollectionKey, document: &Document) -> AppResult<()>;

    /// Delete a document. Returns whether it existed.
    fn delete_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool>;

    /// All documents of a collection in insertion order.
    fn scan(&self, key: &CollectionKey) -> AppResult<Vec<Document>>;

    /// Number of documents in a collection.
    fn count_documents(&self, key: &CollectionKey) -> AppResult<usize> {
        Ok(self.scan(key)?.len())
    }
}
