//! Store configuration management.
//!
//! Settings live in the `store` section of the workspace config file, the
//! same file [`AppConfig`] reads (`.recall/config.yaml` unless
//! `RECALL_CONFIG` names another). Other sections of the file belong to
//! `recall-core` and are left untouched when saving.

use crate::backend::{InMemoryBackend, SqliteBackend, StorageBackend};
use crate::embeddings::{create_provider, EmbeddingConfig};
use crate::store::{VectorStore, DEFAULT_N_RESULTS};
use crate::types::{DistanceMetric, PartitionKey};
use recall_core::config::{AppConfig, RECALL_DIR};
use recall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key of the store section in the config file.
const STORE_SECTION: &str = "store";

/// SQLite path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: BackendKind,

    /// SQLite database file, relative to the workspace unless absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Tenant namespace (string or integer)
    #[serde(default)]
    pub partition_key: PartitionKey,

    /// Metric for newly created collections
    #[serde(default)]
    pub distance_metric: DistanceMetric,

    /// Results per query when the caller does not say
    #[serde(default = "default_n_results")]
    pub n_results: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_n_results() -> usize {
    DEFAULT_N_RESULTS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: None,
            partition_key: PartitionKey::default(),
            distance_metric: DistanceMetric::default(),
            n_results: default_n_results(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Resolved SQLite database location for `workspace`.
    pub fn database_path(&self, workspace: &Path) -> PathBuf {
        match &self.path {
            Some(path) if path.is_absolute() || path.as_os_str() == IN_MEMORY_PATH => path.clone(),
            Some(path) => workspace.join(path),
            None => get_default_db_path(workspace),
        }
    }
}

/// Load store configuration.
///
/// Reads the `store` section of the file at [`AppConfig::config_path`] if
/// present, otherwise returns defaults.
pub fn load_config(app: &AppConfig) -> AppResult<StoreConfig> {
    let config_path = app.config_path();

    if !config_path.exists() {
        tracing::debug!("Using default store config (no config file found)");
        return Ok(StoreConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let document: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    let config = match document.get(STORE_SECTION) {
        Some(section) if !section.is_null() => serde_yaml::from_value(section.clone())
            .map_err(|e| {
                AppError::Config(format!(
                    "Invalid '{}' section in {:?}: {}",
                    STORE_SECTION, config_path, e
                ))
            })?,
        _ => StoreConfig::default(),
    };

    tracing::debug!("Loaded store config from {:?}", config_path);
    Ok(config)
}

/// Save store configuration, preserving the file's other sections.
pub fn save_config(app: &AppConfig, config: &StoreConfig) -> AppResult<()> {
    let config_path = app.config_path();

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let mut document = if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        match serde_yaml::from_str::<serde_yaml::Value>(&content)? {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(AppError::Config(format!(
                    "Config at {:?} is not a mapping",
                    config_path
                )))
            }
        }
    } else {
        serde_yaml::Mapping::new()
    };

    document.insert(
        serde_yaml::Value::String(STORE_SECTION.to_string()),
        serde_yaml::to_value(config)?,
    );

    let yaml = serde_yaml::to_string(&document)?;
    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved store config to {:?}", config_path);
    Ok(())
}

/// Build a [`VectorStore`] from configuration.
pub fn open_store(workspace: &Path, config: &StoreConfig) -> AppResult<VectorStore> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        BackendKind::Memory => Arc::new(InMemoryBackend::new()),
        BackendKind::Sqlite => {
            let path = config.database_path(workspace);
            if path.as_os_str() == IN_MEMORY_PATH {
                Arc::new(SqliteBackend::open_in_memory()?)
            } else {
                Arc::new(SqliteBackend::open(&path)?)
            }
        }
    };

    let provider = create_provider(&config.embedding)?;

    tracing::info!(
        "Opened store (backend: {}, partition: {}, provider: {}/{})",
        backend.backend_name(),
        config.partition_key,
        provider.provider_name(),
        provider.model_name()
    );

    Ok(VectorStore::new(backend, provider)
        .with_partition_key(config.partition_key.clone())
        .with_distance_metric(config.distance_metric)
        .with_default_n_results(config.n_results)
        .with_batch_size(config.embedding.batch_size))
}

/// Default SQLite database path for a workspace.
pub fn get_default_db_path(workspace: &Path) -> PathBuf {
    workspace.join(RECALL_DIR).join("store.sqlite")
}
