//! The vector store facade.

use crate::backend::StorageBackend;
use crate::collection::CollectionManager;
use crate::documents::{DocumentStore, DEFAULT_EMBED_BATCH_SIZE};
use crate::embeddings::EmbeddingProvider;
use crate::retrieval::RetrievalEngine;
use crate::types::{
    Collection, CollectionKey, DistanceMetric, Document, PartitionKey, QueryResult, QueryResults,
};
use parking_lot::RwLock;
use recall_core::AppResult;
use std::sync::Arc;

/// Number of results returned per query when none is requested.
pub const DEFAULT_N_RESULTS: usize = 10;

/// Collections of embedded documents with similarity retrieval.
///
/// All data lives under the store's partition key, so several stores can
/// share one backend without seeing each other's collections. Reads and
/// retrievals hold the target collection's lock shared; collection
/// create/delete and document writes hold it exclusively. The locks belong
/// to the backend, so stores sharing a backend also exclude each other.
#[derive(Debug)]
pub struct VectorStore {
    partition: PartitionKey,
    backend: Arc<dyn StorageBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    default_metric: DistanceMetric,
    default_n_results: usize,
    batch_size: usize,
}

impl VectorStore {
    /// Create a store over `backend` using the default partition.
    pub fn new(backend: Arc<dyn StorageBackend>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            partition: PartitionKey::default(),
            backend,
            provider,
            default_metric: DistanceMetric::default(),
            default_n_results: DEFAULT_N_RESULTS,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn with_partition_key(mut self, partition: impl Into<PartitionKey>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Metric assigned to newly created collections.
    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.default_metric = metric;
        self
    }

    pub fn with_default_n_results(mut self, n_results: usize) -> Self {
        self.default_n_results = n_results;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn backend_name(&self) -> &str {
        self.backend.backend_name()
    }

    /// Lock for a collection, shared with every store on the same backend.
    fn lock(&self, key: &CollectionKey) -> Arc<RwLock<()>> {
        self.backend.collection_locks().handle(key)
    }

    fn collections(&self) -> CollectionManager {
        CollectionManager::new(
            self.partition.clone(),
            Arc::clone(&self.backend),
            self.default_metric,
        )
    }

    fn documents(&self) -> DocumentStore {
        DocumentStore::new(Arc::clone(&self.backend), Arc::clone(&self.provider))
            .with_batch_size(self.batch_size)
    }

    fn retrieval(&self) -> RetrievalEngine {
        RetrievalEngine::new(Arc::clone(&self.backend), Arc::clone(&self.provider))
    }

    // ---- Collections ----

    /// Create a collection.
    ///
    /// An existing collection is dropped and recreated with `overwrite`,
    /// returned unchanged with `get_or_create`, and otherwise rejected with
    /// `AlreadyExists`. `overwrite` takes precedence.
    pub fn create_collection(
        &self,
        name: &str,
        overwrite: bool,
        get_or_create: bool,
    ) -> AppResult<Collection> {
        let manager = self.collections();
        let lock = self.lock(&manager.key(name));
        let _guard = lock.write();
        manager.create(name, overwrite, get_or_create)
    }

    pub fn get_collection(&self, name: &str) -> AppResult<Collection> {
        let manager = self.collections();
        let lock = self.lock(&manager.key(name));
        let _guard = lock.read();
        manager.get(name)
    }

    /// Drop a collection and all of its documents. Missing collections are
    /// ignored.
    pub fn delete_collection(&self, name: &str) -> AppResult<()> {
        let manager = self.collections();
        let lock = self.lock(&manager.key(name));
        let _guard = lock.write();
        manager.delete(name)
    }

    /// Collection names in this partition, in creation order.
    pub fn list_collections(&self) -> AppResult<Vec<String>> {
        self.collections().list()
    }

    pub fn collection_exists(&self, name: &str) -> AppResult<bool> {
        self.collections().exists(name)
    }

    // ---- Documents ----

    /// Insert documents, embedding those without an embedding.
    ///
    /// Without `upsert` any id already stored (or repeated in `docs`) fails
    /// the whole call with `DuplicateKey`.
    pub fn insert_docs(&self, docs: &[Document], collection: &str, upsert: bool) -> AppResult<()> {
        let manager = self.collections();
        manager.get(collection)?;

        let documents = self.documents();
        let prepared = documents.embed_missing(docs)?;

        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.write();
        let target = manager.get(collection)?;
        documents.insert(&key, &target, &prepared, upsert)
    }

    /// Replace content (and metadata, when given) of existing documents.
    ///
    /// Every id must exist; otherwise nothing is written and `NotFound` is
    /// returned.
    pub fn update_docs(&self, docs: &[Document], collection: &str) -> AppResult<()> {
        let manager = self.collections();
        manager.get(collection)?;

        let documents = self.documents();
        let prepared = documents.embed_missing(docs)?;

        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.write();
        let target = manager.get(collection)?;
        documents.update(&key, &target, &prepared)
    }

    /// Delete documents by id, skipping ids that are not stored.
    pub fn delete_docs<S: AsRef<str>>(&self, ids: &[S], collection: &str) -> AppResult<()> {
        let manager = self.collections();
        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.write();
        manager.get(collection)?;
        self.documents().delete(&key, ids)?;
        Ok(())
    }

    /// Stored documents among `ids`, or every document when `ids` is `None`.
    ///
    /// Results are in insertion order regardless of the order of `ids`.
    pub fn get_docs<S: AsRef<str>>(
        &self,
        ids: Option<&[S]>,
        collection: &str,
    ) -> AppResult<Vec<Document>> {
        let manager = self.collections();
        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.read();
        manager.get(collection)?;
        self.documents().get(&key, ids)
    }

    pub fn get_docs_by_ids<S: AsRef<str>>(
        &self,
        ids: &[S],
        collection: &str,
    ) -> AppResult<Vec<Document>> {
        self.get_docs(Some(ids), collection)
    }

    pub fn get_all_docs(&self, collection: &str) -> AppResult<Vec<Document>> {
        self.get_docs::<&str>(None, collection)
    }

    pub fn count_docs(&self, collection: &str) -> AppResult<usize> {
        let manager = self.collections();
        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.read();
        manager.get(collection)?;
        self.documents().count(&key)
    }

    // ---- Retrieval ----

    /// Rank documents against each query.
    ///
    /// Returns one list per query, ascending by distance, truncated to
    /// `n_results` (the store default when `None`) and then filtered by
    /// `distance_threshold`.
    pub fn retrieve_docs<S: AsRef<str>>(
        &self,
        queries: &[S],
        collection: &str,
        n_results: Option<usize>,
        distance_threshold: Option<f32>,
    ) -> AppResult<QueryResults> {
        let manager = self.collections();
        manager.get(collection)?;

        let engine = self.retrieval();
        let embeddings = engine.embed_queries(queries)?;

        let key = manager.key(collection);
        let lock = self.lock(&key);
        let _guard = lock.read();
        let target = manager.get(collection)?;
        engine.retrieve(
            &key,
            &target,
            &embeddings,
            n_results.unwrap_or(self.default_n_results),
            distance_threshold,
        )
    }

    /// Rank documents against a single query with the store defaults.
    pub fn search(&self, query: &str, collection: &str) -> AppResult<QueryResult> {
        let mut results = self.retrieve_docs(&[query], collection, None, None)?;
        Ok(results.pop().unwrap_or_default())
    }
}
