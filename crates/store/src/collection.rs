//! Collection lifecycle management.

use crate::backend::StorageBackend;
use crate::types::{Collection, CollectionKey, DistanceMetric, PartitionKey};
use recall_core::{AppError, AppResult};
use std::sync::Arc;

/// Creates, looks up and drops collections within one partition.
#[derive(Debug, Clone)]
pub struct CollectionManager {
    partition: PartitionKey,
    backend: Arc<dyn StorageBackend>,
    default_metric: DistanceMetric,
}

impl CollectionManager {
    pub fn new(
        partition: PartitionKey,
        backend: Arc<dyn StorageBackend>,
        default_metric: DistanceMetric,
    ) -> Self {
        Self {
            partition,
            backend,
            default_metric,
        }
    }

    /// Backend address of a collection in this partition.
    pub fn key(&self, name: &str) -> CollectionKey {
        CollectionKey::new(&self.partition, name)
    }

    /// Create a collection according to the overwrite / get-or-create policy.
    ///
    /// | exists | overwrite | get_or_create | result |
    /// |---|---|---|---|
    /// | no | any | any | new empty collection |
    /// | yes | true | any | existing dropped, new empty collection |
    /// | yes | false | true | existing returned unchanged |
    /// | yes | false | false | `AlreadyExists` |
    pub fn create(&self, name: &str, overwrite: bool, get_or_create: bool) -> AppResult<Collection> {
        validate_name(name)?;
        let key = self.key(name);

        if let Some(existing) = self.backend.get_collection(&key)? {
            if overwrite {
                tracing::info!("Overwriting collection '{}'", key);
                self.backend.drop_collection(&key)?;
            } else if get_or_create {
                tracing::debug!("Collection '{}' exists, returning it", key);
                return Ok(existing);
            } else {
                return Err(AppError::AlreadyExists(format!("collection '{}'", name)));
            }
        }

        let collection = Collection::new(name, self.default_metric);
        self.backend.create_collection(&key, &collection)?;

        tracing::info!(
            "Created collection '{}' (metric: {}, backend: {})",
            key,
            collection.distance_metric,
            self.backend.backend_name()
        );
        Ok(collection)
    }

    /// Look up a collection, failing with `NotFound` if absent.
    ///
    /// The snapshot carries the document count at the time of the call.
    pub fn get(&self, name: &str) -> AppResult<Collection> {
        self.backend
            .get_collection(&self.key(name))?
            .ok_or_else(|| AppError::collection_not_found(name))
    }

    /// Drop a collection and its documents. Missing collections are a no-op.
    pub fn delete(&self, name: &str) -> AppResult<()> {
        let key = self.key(name);
        if self.backend.drop_collection(&key)? {
            tracing::info!("Deleted collection '{}'", key);
        } else {
            tracing::debug!("Collection '{}' did not exist, nothing to delete", key);
        }
        Ok(())
    }

    pub fn exists(&self, name: &str) -> AppResult<bool> {
        self.backend.collection_exists(&self.key(name))
    }

    /// Names of all collections in this partition, in creation order.
    pub fn list(&self) -> AppResult<Vec<String>> {
        Ok(self
            .backend
            .list_collections(&self.partition.to_string())?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Other(
            "Collection name must not be empty".to_string(),
        ));
    }
    Ok(())
}
