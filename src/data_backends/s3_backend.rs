use super::storage_backend::ObjectStorageBackend;
use crate::config::StorageSettings;
use crate::error::{Operation, Result, StorageError};
use crate::structs::{ObjectLocation, PartETag};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use bytes::Bytes;
use tracing::error;

/// Data backend for S3 compatible object storage (e.g. Aliyun OSS)
#[derive(Debug, Clone)]
pub struct S3Backend {
    pub s3_client: Client,
}

impl S3Backend {
    #[tracing::instrument(level = "trace", skip(settings))]
    pub async fn new(settings: &StorageSettings) -> Result<Self> {
        let (Some(access_key), Some(secret_key)) = (&settings.access_key, &settings.secret_key)
        else {
            return Err(StorageError::ConfigError(
                "Missing access_key or secret_key".to_string(),
            ));
        };

        let credentials = Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "oss_file_storage",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint_url {
            tracing::debug!("S3 Endpoint: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(settings.force_path_style.unwrap_or(false))
            .build();

        Ok(S3Backend {
            s3_client: Client::from_conf(s3_config),
        })
    }
}

fn unavailable<E, R>(operation: Operation, err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    error!(error = ?err, msg = message, %operation);
    StorageError::BackendUnavailable { operation, message }
}

#[async_trait]
impl ObjectStorageBackend for S3Backend {
    // Initiates a multipart upload in s3 and returns the associated upload id.
    #[tracing::instrument(level = "trace", skip(self, location))]
    async fn init_multipart_upload(&self, location: ObjectLocation) -> Result<String> {
        let multipart = self
            .s3_client
            .create_multipart_upload()
            .bucket(location.bucket)
            .key(location.key)
            .send()
            .await
            .map_err(|e| unavailable(Operation::BeginUpload, e))?;

        multipart
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| {
                error!(error = "Missing upload id");
                StorageError::BackendUnavailable {
                    operation: Operation::BeginUpload,
                    message: "Missing upload id".to_string(),
                }
            })
    }

    #[tracing::instrument(level = "trace", skip(self, location, upload_id, data))]
    async fn upload_part(
        &self,
        location: ObjectLocation,
        upload_id: String,
        part_number: i32,
        data: Bytes,
    ) -> Result<PartETag> {
        let content_len = data.len() as i64;
        let upload = self
            .s3_client
            .upload_part()
            .bucket(location.bucket)
            .key(location.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(content_len)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(_) => {
                    let message = DisplayErrorContext(&e).to_string();
                    error!(error = ?e, msg = message, part_number, "Part rejected");
                    StorageError::TransferFailed {
                        part_number,
                        message,
                    }
                }
                _ => unavailable(Operation::UploadPart(part_number), e),
            })?;

        Ok(PartETag {
            part_number,
            etag: upload
                .e_tag()
                .ok_or_else(|| {
                    error!(error = "Missing etag", part_number);
                    StorageError::TransferFailed {
                        part_number,
                        message: "Missing etag".to_string(),
                    }
                })?
                .to_string(),
        })
    }

    #[tracing::instrument(level = "trace", skip(self, location, parts))]
    async fn finish_multipart_upload(
        &self,
        location: ObjectLocation,
        upload_id: String,
        parts: Vec<PartETag>,
    ) -> Result<()> {
        let completed_parts = parts
            .into_iter()
            .map(|etag| {
                CompletedPart::builder()
                    .e_tag(etag.etag)
                    .part_number(etag.part_number)
                    .build()
            })
            .collect::<Vec<_>>();

        self.s3_client
            .complete_multipart_upload()
            .bucket(location.bucket)
            .key(location.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| match e {
                SdkError::ServiceError(_) => {
                    let message = DisplayErrorContext(&e).to_string();
                    error!(error = ?e, msg = message, "Error completing multipart upload");
                    StorageError::FinalizeRejected { message }
                }
                _ => unavailable(Operation::CompleteUpload, e),
            })?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self, location))]
    async fn get_object(&self, location: ObjectLocation) -> Result<Bytes> {
        let object = self
            .s3_client
            .get_object()
            .bucket(location.bucket)
            .key(location.key)
            .send()
            .await
            .map_err(|e| unavailable(Operation::GetObject, e))?;

        let data = object.body.collect().await.map_err(|e| {
            error!(error = ?e, msg = e.to_string());
            StorageError::BackendUnavailable {
                operation: Operation::GetObject,
                message: e.to_string(),
            }
        })?;
        Ok(data.into_bytes())
    }

    #[tracing::instrument(level = "trace", skip(self, location))]
    async fn delete_object(&self, location: ObjectLocation) -> Result<()> {
        self.s3_client
            .delete_object()
            .bucket(location.bucket)
            .key(location.key)
            .send()
            .await
            .map_err(|e| unavailable(Operation::DeleteObject, e))?;
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self, location))]
    async fn object_exists(&self, location: ObjectLocation) -> Result<bool> {
        let listing = self
            .s3_client
            .list_objects_v2()
            .bucket(location.bucket)
            .prefix(location.key)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| unavailable(Operation::ListObjects, e))?;
        Ok(!listing.contents().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_credentials() {
        let settings = StorageSettings::new("files");
        let err = S3Backend::new(&settings).await.unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }
}
