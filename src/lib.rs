//! File storage adapter for S3 compatible object storage (e.g. Aliyun OSS)
//!
//! Files are uploaded with concurrent multipart uploads, see [`uploader::ChunkedUploader`].
pub mod config;
pub mod data_backends;
pub mod error;
pub mod file_storage;
pub mod management;
pub mod structs;
pub mod uploader;

pub use config::{Config, StorageSettings};
pub use error::{Operation, StorageError};
pub use file_storage::{FileStorage, OssFileStorage};
pub use structs::FileRef;
pub use uploader::ChunkedUploader;
