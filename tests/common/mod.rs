#![allow(dead_code)]
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use oss_file_storage::data_backends::storage_backend::ObjectStorageBackend;
use oss_file_storage::error::{Operation, Result, StorageError};
use oss_file_storage::structs::{ObjectLocation, PartETag};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * 1024;

/// How a single part upload should misbehave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartFault {
    /// Return `TransferFailed`
    Reject,
    /// Return `BackendUnavailable`
    Unavailable,
    /// Report success with the tag of another part number
    WrongPartNumber(i32),
    /// Panic inside the upload task
    Panic,
}

#[derive(Debug, Default)]
pub struct Faults {
    pub init: bool,
    pub finish: bool,
    pub parts: BTreeMap<i32, PartFault>,
}

#[derive(Debug, Default)]
struct Session {
    location: ObjectLocation,
    parts: BTreeMap<i32, Bytes>,
}

/// In-memory multipart object store with failure injection
#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub faults: Faults,
    pub part_delay: Option<Duration>,
    /// Per part delays overriding `part_delay`
    pub part_delays: BTreeMap<i32, Duration>,
    objects: DashMap<(String, String), Bytes>,
    sessions: DashMap<String, Session>,
    next_upload_id: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub init_calls: AtomicUsize,
    pub part_calls: Mutex<Vec<(i32, usize)>>,
    /// Part calls that got past their delay, successful or not
    pub completed_part_calls: AtomicUsize,
    pub finish_calls: Mutex<Vec<Vec<i32>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        MemoryBackend {
            faults,
            ..Default::default()
        }
    }

    pub fn with_part_delay(mut self, delay: Duration) -> Self {
        self.part_delay = Some(delay);
        self
    }

    pub fn with_part_delay_for(mut self, part_number: i32, delay: Duration) -> Self {
        self.part_delays.insert(part_number, delay);
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.value().clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn finish_calls(&self) -> Vec<Vec<i32>> {
        self.finish_calls.lock().unwrap().clone()
    }

    pub fn part_calls(&self) -> Vec<(i32, usize)> {
        let mut calls = self.part_calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

fn etag_for(part_number: i32, data: &Bytes) -> String {
    format!("\"{}-{}\"", part_number, data.len())
}

impl MemoryBackend {
    fn store_part(
        &self,
        location: ObjectLocation,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
        fault: Option<PartFault>,
    ) -> Result<PartETag> {
        match fault {
            Some(PartFault::Reject) => {
                return Err(StorageError::TransferFailed {
                    part_number,
                    message: "checksum mismatch".to_string(),
                })
            }
            Some(PartFault::Unavailable) => {
                return Err(StorageError::BackendUnavailable {
                    operation: Operation::UploadPart(part_number),
                    message: "connection reset".to_string(),
                })
            }
            Some(PartFault::WrongPartNumber(other)) => {
                return Ok(PartETag {
                    part_number: other,
                    etag: etag_for(other, &data),
                })
            }
            Some(PartFault::Panic) => {
                return Err(StorageError::TransferFailed {
                    part_number,
                    message: "crashed".to_string(),
                })
            }
            None => {}
        }

        let mut session = self
            .sessions
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::TransferFailed {
                part_number,
                message: "no such upload".to_string(),
            })?;
        assert_eq!(session.location, location);
        let etag = etag_for(part_number, &data);
        session.parts.insert(part_number, data);
        Ok(PartETag { part_number, etag })
    }
}

#[async_trait]
impl ObjectStorageBackend for MemoryBackend {
    async fn init_multipart_upload(&self, location: ObjectLocation) -> Result<String> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.init {
            return Err(StorageError::BackendUnavailable {
                operation: Operation::BeginUpload,
                message: "connection refused".to_string(),
            });
        }
        let upload_id = format!(
            "upload-{}",
            self.next_upload_id.fetch_add(1, Ordering::SeqCst)
        );
        self.sessions.insert(
            upload_id.clone(),
            Session {
                location,
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        location: ObjectLocation,
        upload_id: String,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartETag> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        self.part_calls
            .lock()
            .unwrap()
            .push((part_number, data.len()));

        let delay = self.part_delays.get(&part_number).copied().or(self.part_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fault = self.faults.parts.get(&part_number).copied();
        let result = self.store_part(location, &upload_id, part_number, data, fault);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed_part_calls.fetch_add(1, Ordering::SeqCst);
        if fault == Some(PartFault::Panic) {
            panic!("part {} crashed", part_number);
        }
        result
    }

    async fn finish_multipart_upload(
        &self,
        location: ObjectLocation,
        upload_id: String,
        parts: Vec<PartETag>,
    ) -> Result<()> {
        self.finish_calls
            .lock()
            .unwrap()
            .push(parts.iter().map(|p| p.part_number).collect());
        if self.faults.finish {
            return Err(StorageError::FinalizeRejected {
                message: "InvalidPartOrder".to_string(),
            });
        }

        let (_, session) =
            self.sessions
                .remove(&upload_id)
                .ok_or_else(|| StorageError::FinalizeRejected {
                    message: "NoSuchUpload".to_string(),
                })?;

        let mut seen = HashSet::new();
        let mut data = BytesMut::new();
        let mut last = 0;
        for part in &parts {
            if part.part_number <= last || !seen.insert(part.part_number) {
                return Err(StorageError::FinalizeRejected {
                    message: "InvalidPartOrder".to_string(),
                });
            }
            last = part.part_number;
            let chunk = session.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::FinalizeRejected {
                    message: format!("InvalidPart {}", part.part_number),
                }
            })?;
            if etag_for(part.part_number, chunk) != part.etag {
                return Err(StorageError::FinalizeRejected {
                    message: format!("ETag mismatch for part {}", part.part_number),
                });
            }
            data.extend_from_slice(chunk);
        }

        self.objects
            .insert((location.bucket, location.key), data.freeze());
        Ok(())
    }

    async fn get_object(&self, location: ObjectLocation) -> Result<Bytes> {
        self.object(&location.bucket, &location.key)
            .ok_or_else(|| StorageError::BackendUnavailable {
                operation: Operation::GetObject,
                message: "NoSuchKey".to_string(),
            })
    }

    async fn delete_object(&self, location: ObjectLocation) -> Result<()> {
        self.objects.remove(&(location.bucket, location.key));
        Ok(())
    }

    async fn object_exists(&self, location: ObjectLocation) -> Result<bool> {
        Ok(self
            .objects
            .iter()
            .any(|o| o.key().0 == location.bucket && o.key().1.starts_with(&location.key)))
    }
}

pub fn payload(len: usize) -> Bytes {
    (0..len)
        .map(|i| (i % 251) as u8)
        .collect::<Vec<_>>()
        .into()
}
