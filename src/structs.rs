use crate::error::StorageError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::fmt::Display;
use std::str::FromStr;

/// Bucket and key of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectLocation {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Completion tag of one uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartETag {
    pub part_number: i32,
    pub etag: String,
}

/// Result of a finalized multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub location: ObjectLocation,
    pub upload_id: String,
    pub part_count: usize,
    pub size: usize,
}

/// Characters escaped in the path part of a `FileRef` text form
const PATH_ESCAPES: &AsciiSet = &CONTROLS.add(b'?').add(b'%');

/// Reference to a stored file, binding the logical file name to its object key
///
/// The textual form is `<storage_name>://<path>?<file_name>`. The path is
/// percent-escaped, so the first `?` always separates it from the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub storage_name: String,
    pub path: String,
    pub file_name: String,
}

impl FileRef {
    pub fn new(
        storage_name: impl Into<String>,
        path: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        FileRef {
            storage_name: storage_name.into(),
            path: path.into(),
            file_name: file_name.into(),
        }
    }
}

impl Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}?{}",
            self.storage_name,
            utf8_percent_encode(&self.path, PATH_ESCAPES),
            self.file_name
        )
    }
}

impl FromStr for FileRef {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (storage_name, rest) = s
            .split_once("://")
            .ok_or_else(|| StorageError::InvalidArgument(format!("Invalid file ref: {}", s)))?;
        let (path, file_name) = rest
            .split_once('?')
            .ok_or_else(|| StorageError::InvalidArgument(format!("Invalid file ref: {}", s)))?;
        if storage_name.is_empty() || path.is_empty() {
            return Err(StorageError::InvalidArgument(format!(
                "Invalid file ref: {}",
                s
            )));
        }
        let path = percent_decode_str(path).decode_utf8().map_err(|e| {
            StorageError::InvalidArgument(format!("Invalid file ref path: {}", e))
        })?;
        Ok(FileRef::new(storage_name, path, file_name))
    }
}
