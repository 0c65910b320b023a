//! Embedding configuration.

use recall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Embedding settings for a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama" ("mock" is an alias of "trigram")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Provider-specific configuration (JSON object)
    #[serde(default)]
    pub provider_config: serde_json::Value,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_normalize() -> bool {
    true
}

fn default_batch_size() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            normalize: default_normalize(),
            batch_size: default_batch_size(),
            provider_config: serde_json::json!({}),
        }
    }
}

impl EmbeddingConfig {
    /// Reject settings no provider can honor.
    pub fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up a string option in `provider_config`.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.provider_config.get(key).and_then(|v| v.as_str())
    }
}
