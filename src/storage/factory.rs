use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::backend::{Connector, StorageBackend};
use super::config::StorageConfig;
use super::error::StorageResult;
use super::object_store::ObjectStoreBackend;

/// Factory for creating storage backends
#[derive(Debug, Default, Clone, Copy)]
pub struct StorageBackendFactory;

impl StorageBackendFactory {
    /// Create a storage backend from a configuration.
    ///
    /// Every provider is served by the same `object_store` based backend
    /// (AWS S3, Azure, GCS, local filesystem or in-memory).
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * Required credential options are missing for the provider
    /// * The local root path does not exist or is not a directory
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
        let backend = ObjectStoreBackend::new(config.clone())?;
        info!(
            "Connected storage backend type={} container={}",
            config.storage_type, config.container
        );
        Ok(Arc::new(backend))
    }
}

#[async_trait]
impl Connector for StorageBackendFactory {
    async fn connect(&self, config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
        Self::from_config(config).await
    }
}
