//! Vector store type definitions.

use chrono::{DateTime, Utc};
use recall_core::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Free-form document metadata.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Ranked results for a single query: documents paired with their distance.
pub type QueryResult = Vec<(Document, f32)>;

/// One [`QueryResult`] per query, in query order.
pub type QueryResults = Vec<QueryResult>;

/// A text document stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within its collection
    pub id: String,

    /// Text content
    pub content: String,

    /// Optional metadata mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    /// Embedding vector, present once the document is indexed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    /// Create a document without metadata or embedding.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: None,
            embedding: None,
        }
    }

    /// Create a document with a freshly generated id.
    pub fn with_generated_id(content: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), content)
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Dissimilarity function used to rank documents. Lower is more similar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine_similarity`, clamped at zero
    #[default]
    Cosine,
    /// L2 distance
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(AppError::Config(format!(
                "Unknown distance metric: '{}'. Supported: cosine, euclidean",
                other
            ))),
        }
    }
}

/// Snapshot of a collection's descriptor and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection name, unique within a database
    pub name: String,

    /// Embedding dimension, fixed by the first stored embedding
    pub embedding_dimension: Option<usize>,

    /// Metric used for retrieval
    pub distance_metric: DistanceMetric,

    /// When the collection was (re)created
    pub created_at: DateTime<Utc>,

    /// Number of documents at the time the snapshot was taken
    #[serde(default)]
    pub document_count: usize,
}

impl Collection {
    /// Describe a new, empty collection.
    pub fn new(name: impl Into<String>, distance_metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            embedding_dimension: None,
            distance_metric,
            created_at: Utc::now(),
            document_count: 0,
        }
    }
}

/// Namespace isolating one tenant's data within shared storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionKey {
    Int(i64),
    Text(String),
}

impl Default for PartitionKey {
    fn default() -> Self {
        PartitionKey::Text("default".to_string())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Int(seed) => write!(f, "{}", seed),
            PartitionKey::Text(name) => f.write_str(name),
        }
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey::Text(value.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey::Text(value)
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        PartitionKey::Int(value)
    }
}

/// Backend address of a collection: partition plus collection name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionKey {
    pub partition: String,
    pub name: String,
}

impl CollectionKey {
    pub fn new(partition: &PartitionKey, name: &str) -> Self {
        Self {
            partition: partition.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.name)
    }
}
