//! Concurrent multipart upload of an in-memory payload
//!
//! The payload is split into fixed-size chunks, every chunk is uploaded as one
//! part on a bounded set of tokio tasks and the object is only finalized once
//! the complete part set `1..=part_count` has been collected.
use crate::data_backends::storage_backend::ObjectStorageBackend;
use crate::error::{Operation, Result, StorageError};
use crate::structs::{CompletedUpload, ObjectLocation, PartETag};
use bytes::Bytes;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Number of parts that are uploaded at the same time
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Splits a payload of `len` bytes into `[i * chunk_size, min((i + 1) * chunk_size, len))`
/// ranges. An empty payload yields exactly one empty range so that every
/// upload goes through the same protocol.
pub fn partition(len: usize, chunk_size: usize) -> Result<Vec<Range<usize>>> {
    if chunk_size == 0 {
        return Err(StorageError::InvalidArgument(
            "chunk size must be greater than 0".to_string(),
        ));
    }
    if len == 0 {
        return Ok(vec![0..0]);
    }
    Ok((0..len.div_ceil(chunk_size))
        .map(|i| i * chunk_size..((i + 1) * chunk_size).min(len))
        .collect())
}

/// Uploads payloads as multipart objects through an `ObjectStorageBackend`
#[derive(Debug, Clone)]
pub struct ChunkedUploader {
    backend: Arc<dyn ObjectStorageBackend>,
    concurrency: usize,
}

impl ChunkedUploader {
    /// Creates an uploader with `DEFAULT_CONCURRENCY` parts in flight
    pub fn new(backend: Arc<dyn ObjectStorageBackend>) -> Self {
        ChunkedUploader {
            backend,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the maximum number of parts in flight, values below 1 become 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Maximum number of parts in flight
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Uploads `payload` to `location` in parts of `chunk_size` bytes
    ///
    /// Opens exactly one upload session and issues one `upload_part` call per
    /// chunk. Once a part fails no further parts are dispatched, parts that are
    /// already running are drained and the session is left unfinalized.
    /// Every spawned task has finished when this returns; dropping the future
    /// aborts the tasks still in flight.
    #[tracing::instrument(
        level = "debug",
        skip(self, payload, location),
        fields(bucket = %location.bucket, key = %location.key, size = payload.len())
    )]
    pub async fn upload(
        &self,
        payload: Bytes,
        location: ObjectLocation,
        chunk_size: usize,
    ) -> Result<CompletedUpload> {
        let chunks = partition(payload.len(), chunk_size)?;
        let part_count = chunks.len();
        if i32::try_from(part_count).is_err() {
            return Err(StorageError::InvalidArgument(format!(
                "{} parts exceed the part number range",
                part_count
            )));
        }

        let upload_id = self.backend.init_multipart_upload(location.clone()).await?;
        debug!(%upload_id, part_count, "Multipart upload session opened");

        let results: Arc<Mutex<Vec<PartETag>>> =
            Arc::new(Mutex::new(Vec::with_capacity(part_count)));
        let failed = Arc::new(AtomicBool::new(false));
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (idx, range) in chunks.into_iter().enumerate() {
            let part_number = idx as i32 + 1;
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            if failed.load(Ordering::Acquire) {
                warn!(part_number, "Part failed, remaining parts are not dispatched");
                break;
            }

            let backend = self.backend.clone();
            let location = location.clone();
            let upload_id = upload_id.clone();
            let chunk = payload.slice(range);
            let results = results.clone();
            let failed = failed.clone();

            tasks.spawn(async move {
                let _permit = permit;
                match backend
                    .upload_part(location, upload_id, part_number, chunk)
                    .await
                {
                    Ok(tag) => {
                        results.lock().await.push(tag);
                        Ok(())
                    }
                    Err(e) => {
                        failed.store(true, Ordering::Release);
                        Err(e)
                    }
                }
            });
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => {
                    error!(error = ?e, msg = e.to_string(), "Part upload task did not finish");
                }
            }
        }

        if let Some(err) = errors.into_iter().min_by_key(|e| match e.operation() {
            Some(Operation::UploadPart(part_number)) => part_number,
            _ => i32::MAX,
        }) {
            error!(%upload_id, error = ?err, "Multipart upload aborted");
            return Err(err);
        }

        let mut parts = std::mem::take(&mut *results.lock().await);
        parts.sort_by_key(|p| p.part_number);
        let complete = parts.len() == part_count
            && parts
                .iter()
                .enumerate()
                .all(|(idx, p)| p.part_number == idx as i32 + 1);
        if !complete {
            let mut completed = parts
                .iter()
                .map(|p| p.part_number)
                .filter(|n| *n >= 1 && (*n as usize) <= part_count)
                .collect::<Vec<_>>();
            completed.dedup();
            error!(
                %upload_id,
                expected = part_count,
                completed = completed.len(),
                "Upload multiparts failed, some parts are not finished"
            );
            return Err(StorageError::IncompleteUpload {
                expected: part_count,
                completed: completed.len(),
            });
        }

        self.backend
            .finish_multipart_upload(location.clone(), upload_id.clone(), parts)
            .await?;
        info!(%upload_id, part_count, "Multipart upload completed");

        Ok(CompletedUpload {
            location,
            upload_id,
            part_count,
            size: payload.len(),
        })
    }
}
