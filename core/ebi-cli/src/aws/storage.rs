use super::cloud_error;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use ebi::{CloudError, ObjectInfo, ObjectStoreClient};
use std::path::Path;

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, CloudError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(Some(ObjectInfo {
                content_length: output.content_length(),
                e_tag: output.e_tag().map(str::to_string),
            })),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(err) => Err(cloud_error("head_object", err)),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), CloudError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| CloudError::Unknown(format!("cannot read {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| cloud_error("put_object", e))?;
        Ok(())
    }
}
