use crate::config::StorageSettings;
use crate::data_backends::client_handle::ClientHandle;
use crate::data_backends::location_handler::create_file_key;
use crate::data_backends::s3_backend::S3Backend;
use crate::data_backends::storage_backend::ObjectStorageBackend;
use crate::error::Result;
use crate::logerr;
use crate::structs::{FileRef, ObjectLocation};
use crate::uploader::ChunkedUploader;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{watch, Mutex};
use tracing::info;

/// Generic file storage abstraction, the OSS storage is one implementation of it
#[async_trait]
pub trait FileStorage: Debug + Send + Sync {
    fn storage_name(&self) -> &str;

    /// Stores the whole stream under a freshly generated key
    async fn save_stream(
        &self,
        file_name: &str,
        stream: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<FileRef>;

    async fn open_stream(&self, reference: &FileRef) -> Result<Bytes>;

    async fn remove_file(&self, reference: &FileRef) -> Result<()>;

    async fn file_exists(&self, reference: &FileRef) -> Result<bool>;

    fn as_oss(&self) -> Option<&OssFileStorage> {
        None
    }
}

/// Settings and backend that are always swapped together
#[derive(Debug)]
pub struct ActiveClient {
    pub settings: StorageSettings,
    pub backend: Arc<dyn ObjectStorageBackend>,
}

#[derive(Debug)]
pub struct OssFileStorage {
    storage_name: String,
    client: ClientHandle<ActiveClient>,
    // Held from reading the active settings until the rebuilt client is published
    refresh_lock: Mutex<()>,
}

impl OssFileStorage {
    /// Connects a new S3 backend for `settings`
    pub async fn connect(mut settings: StorageSettings) -> Result<Self> {
        settings.validate()?;
        let backend = S3Backend::new(&settings).await?;
        Ok(Self::with_backend(settings, Arc::new(backend)))
    }

    pub fn with_backend(
        settings: StorageSettings,
        backend: Arc<dyn ObjectStorageBackend>,
    ) -> Self {
        OssFileStorage {
            storage_name: settings.name.clone(),
            client: ClientHandle::new(Arc::new(ActiveClient { settings, backend })),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> StorageSettings {
        self.client.snapshot().settings.clone()
    }

    pub fn active_client(&self) -> Arc<ActiveClient> {
        self.client.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ActiveClient>> {
        self.client.subscribe()
    }

    /// Rebuilds the S3 client for `settings` and makes it the active one
    #[tracing::instrument(level = "trace", skip(self, settings))]
    pub async fn refresh_client(&self, settings: StorageSettings) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.connect_and_publish(settings).await
    }

    /// Applies `update` to the active settings, rebuilds the S3 client and
    /// publishes it. Concurrent updates are applied one after another.
    #[tracing::instrument(level = "trace", skip(self, update))]
    pub async fn update_client(&self, update: impl FnOnce(&mut StorageSettings)) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        let mut settings = self.settings();
        update(&mut settings);
        self.connect_and_publish(settings).await
    }

    /// Rebuilds the S3 client from the currently active settings
    pub async fn reconnect(&self) -> Result<()> {
        self.update_client(|_| {}).await
    }

    async fn connect_and_publish(&self, mut settings: StorageSettings) -> Result<()> {
        settings.validate()?;
        let backend = S3Backend::new(&settings).await.inspect_err(logerr!())?;
        self.publish(settings, Arc::new(backend));
        Ok(())
    }

    /// Makes `backend` the active client without rebuilding anything
    pub fn publish(&self, settings: StorageSettings, backend: Arc<dyn ObjectStorageBackend>) {
        info!(
            storage = %self.storage_name,
            bucket = %settings.bucket,
            "Publishing storage client"
        );
        self.client.replace(Arc::new(ActiveClient { settings, backend }));
    }

    #[tracing::instrument(level = "trace", skip(self, data))]
    pub async fn save_bytes(&self, file_name: &str, data: Bytes) -> Result<FileRef> {
        let active = self.client.snapshot();
        let key = create_file_key(file_name, Utc::now());
        let location = ObjectLocation::new(active.settings.bucket.clone(), key.clone());

        ChunkedUploader::new(active.backend.clone())
            .with_concurrency(active.settings.upload_concurrency)
            .upload(data, location, active.settings.chunk_size_bytes())
            .await
            .inspect_err(logerr!())?;

        Ok(FileRef::new(self.storage_name.clone(), key, file_name))
    }

    fn location(&self, active: &ActiveClient, reference: &FileRef) -> ObjectLocation {
        ObjectLocation::new(active.settings.bucket.clone(), reference.path.clone())
    }
}

#[async_trait]
impl FileStorage for OssFileStorage {
    fn storage_name(&self) -> &str {
        &self.storage_name
    }

    async fn save_stream(
        &self,
        file_name: &str,
        stream: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<FileRef> {
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.inspect_err(logerr!())?;
        self.save_bytes(file_name, Bytes::from(data)).await
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn open_stream(&self, reference: &FileRef) -> Result<Bytes> {
        let active = self.client.snapshot();
        active
            .backend
            .get_object(self.location(&active, reference))
            .await
            .inspect_err(logerr!())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn remove_file(&self, reference: &FileRef) -> Result<()> {
        let active = self.client.snapshot();
        active
            .backend
            .delete_object(self.location(&active, reference))
            .await
            .inspect_err(logerr!())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn file_exists(&self, reference: &FileRef) -> Result<bool> {
        let active = self.client.snapshot();
        active
            .backend
            .object_exists(self.location(&active, reference))
            .await
            .inspect_err(logerr!())
    }

    fn as_oss(&self) -> Option<&OssFileStorage> {
        Some(self)
    }
}
