//! Embedded vector document store.
//!
//! Documents are grouped into named collections, embedded with a pluggable
//! [`EmbeddingProvider`], persisted through a [`StorageBackend`] and
//! retrieved by distance to embedded queries. Everything a [`VectorStore`]
//! touches is scoped to its partition key, so tenants can share one backend.
//!
//! ```no_run
//! use recall_store::{open_store, Document, StoreConfig};
//! use std::path::Path;
//!
//! # fn main() -> recall_core::AppResult<()> {
//! let store = open_store(Path::new("."), &StoreConfig::default())?;
//! store.create_collection("memories", false, true)?;
//! store.insert_docs(&[Document::new("1", "likes green tea")], "memories", false)?;
//! let hits = store.retrieve_docs(&["tea"], "memories", Some(3), None)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod collection;
pub mod config;
pub mod distance;
pub mod documents;
pub mod embeddings;
pub mod locks;
pub mod retrieval;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backend::{InMemoryBackend, SqliteBackend, StorageBackend};
pub use config::{load_config, open_store, save_config, BackendKind, StoreConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use store::{VectorStore, DEFAULT_N_RESULTS};
pub use types::{
    Collection, CollectionKey, DistanceMetric, Document, Metadata, PartitionKey, QueryResult,
    QueryResults,
};
