//! Nearest-neighbour retrieval over a collection.

use crate::backend::StorageBackend;
use crate::embeddings::EmbeddingProvider;
use crate::types::{Collection, CollectionKey, DistanceMetric, Document, QueryResult, QueryResults};
use recall_core::{AppError, AppResult};
use std::sync::Arc;

/// Ranks stored documents against embedded queries.
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    backend: Arc<dyn StorageBackend>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl RetrievalEngine {
    pub fn new(backend: Arc<dyn StorageBackend>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { backend, provider }
    }

    /// Embed all queries in one provider call.
    ///
    /// Storage is not touched, so this can run before the collection lock is
    /// taken.
    pub fn embed_queries<S: AsRef<str>>(&self, queries: &[S]) -> AppResult<Vec<Vec<f32>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = queries.iter().map(|q| q.as_ref().to_string()).collect();
        let embeddings = self.provider.embed_batch(&texts)?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} queries",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    /// One ranked list per query embedding, in query order.
    pub fn retrieve(
        &self,
        key: &CollectionKey,
        collection: &Collection,
        query_embeddings: &[Vec<f32>],
        n_results: usize,
        distance_threshold: Option<f32>,
    ) -> AppResult<QueryResults> {
        if let Some(expected) = collection.embedding_dimension {
            if let Some(bad) = query_embeddings.iter().find(|q| q.len() != expected) {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }

        if query_embeddings
            .iter()
            .any(|q| q.iter().any(|v| !v.is_finite()))
        {
            return Err(AppError::Embedding(
                "Query embedding has a non-finite component".to_string(),
            ));
        }

        let documents = self.backend.scan(key)?;

        let results: QueryResults = query_embeddings
            .iter()
            .map(|query| {
                rank(
                    &documents,
                    query,
                    collection.distance_metric,
                    n_results,
                    distance_threshold,
                )
            })
            .collect();

        tracing::debug!(
            "Retrieved from '{}': {} queries over {} documents (n_results: {}, threshold: {:?})",
            key,
            query_embeddings.len(),
            documents.len(),
            n_results,
            distance_threshold
        );

        Ok(results)
    }
}

/// Rank `documents` by distance to `query`.
///
/// Sorting is stable, so equal distances keep the order of `documents`. The
/// threshold is applied after truncating to `n_results` and never pulls in
/// documents beyond the top `n_results`. Documents without an embedding are
/// skipped.
pub fn rank(
    documents: &[Document],
    query: &[f32],
    metric: DistanceMetric,
    n_results: usize,
    distance_threshold: Option<f32>,
) -> QueryResult {
    if n_results == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(&Document, f32)> = documents
        .iter()
        .filter_map(|doc| {
            doc.embedding
                .as_ref()
                .map(|embedding| (doc, metric.distance(query, embedding)))
        })
        .collect();

    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(n_results);

    scored
        .into_iter()
        .filter(|(_, distance)| distance_threshold.map_or(true, |t| *distance <= t))
        .map(|(doc, distance)| (doc.clone(), distance))
        .collect()
}
