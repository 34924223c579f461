use crate::config::StorageSettings;
use crate::error::{Result, StorageError};
use crate::file_storage::{FileStorage, OssFileStorage};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const REFRESHED: &str = "Refreshed successfully";

/// Registry of the named file storages of the process
#[derive(Debug)]
pub struct StorageLocator {
    storages: DashMap<String, Arc<dyn FileStorage>>,
    default_name: String,
}

impl StorageLocator {
    pub fn new(default: Arc<dyn FileStorage>) -> Self {
        let default_name = default.storage_name().to_string();
        let storages = DashMap::new();
        storages.insert(default_name.clone(), default);
        StorageLocator {
            storages,
            default_name,
        }
    }

    pub fn register(&self, storage: Arc<dyn FileStorage>) {
        self.storages
            .insert(storage.storage_name().to_string(), storage);
    }

    pub fn get_default(&self) -> Option<Arc<dyn FileStorage>> {
        self.get_by_name(&self.default_name)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn FileStorage>> {
        self.storages.get(name).map(|s| s.value().clone())
    }

    /// Rebuilds the client of the default storage from its current settings
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn refresh_default(&self) -> Result<String> {
        let Some(storage) = self.get_default() else {
            return Ok(ignored(&self.default_name));
        };
        let Some(oss) = storage.as_oss() else {
            return Ok(ignored(&self.default_name));
        };
        oss.reconnect().await?;
        info!(storage = %self.default_name, "Storage client refreshed");
        Ok(REFRESHED.to_string())
    }

    /// Replaces the credentials of a storage and rebuilds its client
    #[tracing::instrument(level = "trace", skip(self, access_key, secret_key))]
    pub async fn refresh_credentials(
        &self,
        storage_name: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<String> {
        self.refresh_with(storage_name, |settings| {
            settings.access_key = Some(access_key.to_string());
            settings.secret_key = Some(secret_key.to_string());
        })
        .await
    }

    /// Replaces credentials, region, bucket, chunk size (KiB) and endpoint
    /// of a storage and rebuilds its client
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(level = "trace", skip(self, access_key, secret_key))]
    pub async fn refresh_settings(
        &self,
        storage_name: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        bucket: &str,
        chunk_size: usize,
        endpoint_url: Option<&str>,
    ) -> Result<String> {
        if chunk_size == 0 {
            return Err(StorageError::InvalidArgument(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        self.refresh_with(storage_name, |settings| {
            settings.access_key = Some(access_key.to_string());
            settings.secret_key = Some(secret_key.to_string());
            settings.region = region.to_string();
            settings.bucket = bucket.to_string();
            settings.chunk_size = chunk_size;
            settings.endpoint_url = endpoint_url.map(|e| e.to_string());
        })
        .await
    }

    async fn refresh_with(
        &self,
        storage_name: &str,
        update: impl FnOnce(&mut StorageSettings),
    ) -> Result<String> {
        let Some(storage) = self.get_by_name(storage_name) else {
            return Ok(ignored(storage_name));
        };
        let Some(oss) = storage.as_oss() else {
            return Ok(ignored(storage_name));
        };
        oss.update_client(update).await?;
        info!(storage = %storage_name, "Storage client refreshed");
        Ok(REFRESHED.to_string())
    }
}

fn ignored(storage_name: &str) -> String {
    warn!(storage = %storage_name, "Refresh ignored");
    format!(
        "{} is not an OSS file storage - refresh attempt ignored",
        storage_name
    )
}

impl From<Arc<OssFileStorage>> for StorageLocator {
    fn from(storage: Arc<OssFileStorage>) -> Self {
        StorageLocator::new(storage)
    }
}
