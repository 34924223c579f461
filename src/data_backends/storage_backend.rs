use crate::error::Result;
use crate::structs::{ObjectLocation, PartETag};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;

/// A generic backend API for storing and retrieving objects
/// Represents a very simple object storage API modelled after S3 multipart uploads
#[async_trait]
pub trait ObjectStorageBackend: Debug + Send + Sync {
    /// Initiates a multipart upload.
    /// Returns the UploadID of the multipart upload
    /// # Arguments
    ///
    /// * `location` - The location of the object which to upload
    async fn init_multipart_upload(&self, location: ObjectLocation) -> Result<String>;

    /// Uploads one part of an object in a multipart upload
    /// Returns the ETag of the uploaded part
    /// # Arguments
    ///
    /// * `location` - The location of the object
    /// * `upload_id` - The upload id of the multipart upload
    /// * `part_number` - The 1-based number of the uploaded part in the final sequence
    /// * `data` - The bytes of this part
    async fn upload_part(
        &self,
        location: ObjectLocation,
        upload_id: String,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartETag>;

    /// Finishes a multipart upload
    /// # Arguments
    ///
    /// * `location` - The location of the object
    /// * `upload_id` - The upload id of the multipart upload
    /// * `parts` - All uploaded parts in ascending part_number order
    async fn finish_multipart_upload(
        &self,
        location: ObjectLocation,
        upload_id: String,
        parts: Vec<PartETag>,
    ) -> Result<()>;

    /// Downloads the whole object
    async fn get_object(&self, location: ObjectLocation) -> Result<Bytes>;

    /// Delete a object from the storage system
    async fn delete_object(&self, location: ObjectLocation) -> Result<()>;

    /// Checks whether any object exists under the key of `location`
    async fn object_exists(&self, location: ObjectLocation) -> Result<bool>;
}
