//! Document CRUD within a collection.
//!
//! Every method validates its whole batch before the first write, so a
//! rejected call leaves the collection untouched. Callers hold the
//! collection's lock; this module does no locking of its own.

use crate::backend::StorageBackend;
use crate::embeddings::EmbeddingProvider;
use crate::types::{Collection, CollectionKey, Document};
use recall_core::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Default number of texts sent to the provider per call.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 100;

/// Inserts, updates, deletes and reads documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    backend: Arc<dyn StorageBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn StorageBackend>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            backend,
            provider,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    /// Set how many texts are embedded per provider call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Copy `docs`, computing embeddings for those that lack one.
    ///
    /// Does not touch storage, so it can run before the collection lock is
    /// taken.
    pub fn embed_missing(&self, docs: &[Document]) -> AppResult<Vec<Document>> {
        let mut prepared = docs.to_vec();

        let pending: Vec<usize> = prepared
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return Ok(prepared);
        }

        tracing::debug!(
            "Embedding {} documents with provider '{}' (model: {})",
            pending.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch
                .iter()
                .map(|&i| prepared[i].content.clone())
                .collect();

            let embeddings = self.provider.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(AppError::Embedding(format!(
                    "Provider returned {} embeddings for {} texts",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (&i, embedding) in batch.iter().zip(embeddings) {
                prepared[i].embedding = Some(embedding);
            }
        }

        Ok(prepared)
    }

    /// Insert documents; with `upsert` existing ids are overwritten.
    ///
    /// Documents must already carry embeddings (see [`embed_missing`](Self::embed_missing)).
    pub fn insert(
        &self,
        key: &CollectionKey,
        collection: &Collection,
        docs: &[Document],
        upsert: bool,
    ) -> AppResult<()> {
        if docs.is_empty() {
            return Ok(());
        }

        if !upsert {
            let mut seen = HashSet::new();
            for doc in docs {
                if !seen.insert(doc.id.as_str()) || self.backend.contains_document(key, &doc.id)? {
                    return Err(AppError::DuplicateKey {
                        collection: collection.name.clone(),
                        id: doc.id.clone(),
                    });
                }
            }
        }

        self.check_dimensions(key, collection, docs)?;

        for doc in docs {
            self.backend.put_document(key, doc)?;
        }

        tracing::info!(
            "Inserted {} documents into '{}' (upsert: {})",
            docs.len(),
            key,
            upsert
        );
        Ok(())
    }

    /// Overwrite existing documents.
    ///
    /// Fails with `NotFound` naming every missing id. Metadata is kept when
    /// the update does not carry any.
    pub fn update(
        &self,
        key: &CollectionKey,
        collection: &Collection,
        docs: &[Document],
    ) -> AppResult<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let mut missing = Vec::new();
        let mut merged = Vec::with_capacity(docs.len());
        for doc in docs {
            match self.backend.get_document(key, &doc.id)? {
                Some(existing) => {
                    let mut updated = doc.clone();
                    if updated.metadata.is_none() {
                        updated.metadata = existing.metadata;
                    }
                    merged.push(updated);
                }
                None => missing.push(doc.id.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(AppError::NotFound(format!(
                "documents [{}] in collection '{}'",
                missing.join(", "),
                collection.name
            )));
        }

        self.check_dimensions(key, collection, &merged)?;

        for doc in &merged {
            self.backend.put_document(key, doc)?;
        }

        tracing::info!("Updated {} documents in '{}'", merged.len(), key);
        Ok(())
    }

    /// Delete documents by id. Ids that are not stored are skipped.
    ///
    /// Returns how many documents were removed.
    pub fn delete<S: AsRef<str>>(&self, key: &CollectionKey, ids: &[S]) -> AppResult<usize> {
        let mut removed = 0;
        for id in ids {
            if self.backend.delete_document(key, id.as_ref())? {
                removed += 1;
            }
        }

        tracing::info!(
            "Deleted {} of {} requested documents from '{}'",
            removed,
            ids.len(),
            key
        );
        Ok(removed)
    }

    /// Documents with the given ids, or all documents when `ids` is `None`.
    ///
    /// Results follow store (insertion) order, not the order of `ids`, and
    /// ids that are not stored are omitted.
    pub fn get<S: AsRef<str>>(
        &self,
        key: &CollectionKey,
        ids: Option<&[S]>,
    ) -> AppResult<Vec<Document>> {
        let documents = self.backend.scan(key)?;

        match ids {
            None => Ok(documents),
            Some(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
                Ok(documents
                    .into_iter()
                    .filter(|doc| wanted.contains(doc.id.as_str()))
                    .collect())
            }
        }
    }

    pub fn count(&self, key: &CollectionKey) -> AppResult<usize> {
        self.backend.count_documents(key)
    }

    /// Ensure every embedding is finite and matches the collection
    /// dimension, fixing the dimension from the first embedding if the
    /// collection has none yet.
    fn check_dimensions(
        &self,
        key: &CollectionKey,
        collection: &Collection,
        docs: &[Document],
    ) -> AppResult<()> {
        let mut expected = collection.embedding_dimension;

        for doc in docs {
            let embedding = doc.embedding.as_ref().ok_or_else(|| {
                AppError::Embedding(format!("Document '{}' has no embedding", doc.id))
            })?;

            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Embedding(format!(
                    "Document '{}' has a non-finite embedding component",
                    doc.id
                )));
            }

            match expected {
                Some(dim) if dim != embedding.len() => {
                    return Err(AppError::DimensionMismatch {
                        expected: dim,
                        actual: embedding.len(),
                    });
                }
                Some(_) => {}
                None => expected = Some(embedding.len()),
            }
        }

        if collection.embedding_dimension.is_none() {
            if let Some(dim) = expected {
                let mut fixed = collection.clone();
                fixed.embedding_dimension = Some(dim);
                self.backend.update_collection(key, &fixed)?;
                tracing::debug!("Fixed embedding dimension of '{}' to {}", key, dim);
            }
        }

        Ok(())
    }
}
