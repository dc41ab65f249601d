//! Transfer primitive: listing, upload, download, server-side copy and
//! batched delete against an S3-compatible object store.
//!
//! The engine talks to the store through the [`ObjectStore`] trait so tests
//! can substitute an in-memory double; [`S3Store`] is the production
//! implementation on top of the AWS SDK.

use anyhow::{Context, Result};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub key: String,
    pub size: u64,
    pub mtime: std::time::SystemTime,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<StoreEntry>,
    pub next_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub key: String,
    pub error: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// One page of the store's list pagination; entries arrive in
    /// lexicographic key order.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// Returns the number of bytes uploaded.
    async fn upload(&self, src: &std::path::Path, bucket: &str, key: &str) -> Result<u64>;

    /// Returns the number of bytes downloaded; parent directories of `dst`
    /// are created as needed.
    async fn download(&self, bucket: &str, key: &str, dst: &std::path::Path) -> Result<u64>;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()>;

    /// Bulk delete; the response carries one outcome per key so partial
    /// failures can be reported individually.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>>;
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    /// Credentials come from the default provider chain. A custom endpoint
    /// (MinIO, localstack) implies path-style addressing.
    pub async fn from_env(endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let mut request = self.client.list_objects_v2().bucket(bucket);
        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed listing s3://{}/{}", bucket, prefix))?;
        let mut entries = Vec::with_capacity(response.contents().len());
        for object in response.contents() {
            let Some(key) = object.key() else { continue };
            let mtime = match object.last_modified() {
                Some(timestamp) => std::time::SystemTime::try_from(*timestamp)
                    .with_context(|| format!("invalid timestamp on s3://{}/{}", bucket, key))?,
                None => std::time::SystemTime::UNIX_EPOCH,
            };
            entries.push(StoreEntry {
                key: key.to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                mtime,
                storage_class: object.storage_class().map(|class| class.as_str().to_string()),
            });
        }
        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage {
            entries,
            next_token,
        })
    }

    async fn upload(&self, src: &std::path::Path, bucket: &str, key: &str) -> Result<u64> {
        let _permit = throttle::open_file_permit().await;
        let size = tokio::fs::metadata(src)
            .await
            .with_context(|| format!("failed reading metadata from {:?}", src))?
            .len();
        let body = aws_sdk_s3::primitives::ByteStream::from_path(src)
            .await
            .with_context(|| format!("cannot open {:?} for reading", src))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed uploading {:?} to s3://{}/{}", src, bucket, key))?;
        Ok(size)
    }

    async fn download(&self, bucket: &str, key: &str, dst: &std::path::Path) -> Result<u64> {
        let _permit = throttle::open_file_permit().await;
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed requesting s3://{}/{}", bucket, key))?;
        if let Some(parent) = dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create directory {:?}", parent))?;
        }
        let mut reader = response.body.into_async_read();
        let mut writer = tokio::fs::File::create(dst)
            .await
            .with_context(|| format!("cannot open {:?} for writing", dst))?;
        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .with_context(|| format!("failed writing s3://{}/{} to {:?}", bucket, key, dst))?;
        Ok(bytes)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", src_bucket, src_key))
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .with_context(|| {
                format!(
                    "failed copying s3://{}/{} to s3://{}/{}",
                    src_bucket, src_key, dst_bucket, dst_key
                )
            })?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<Vec<DeleteOutcome>> {
        let identifiers = keys
            .iter()
            .map(|key| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .with_context(|| format!("invalid delete key {:?}", key))
            })
            .collect::<Result<Vec<_>>>()?;
        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(identifiers))
            .build()
            .context("failed building bulk delete request")?;
        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .with_context(|| format!("failed deleting {} objects from s3://{}", keys.len(), bucket))?;
        let mut outcomes = Vec::with_capacity(keys.len());
        for deleted in response.deleted() {
            if let Some(key) = deleted.key() {
                outcomes.push(DeleteOutcome {
                    key: key.to_string(),
                    error: None,
                });
            }
        }
        for error in response.errors() {
            outcomes.push(DeleteOutcome {
                key: error.key().unwrap_or_default().to_string(),
                error: Some(format!(
                    "{}: {}",
                    error.code().unwrap_or("error"),
                    error.message().unwrap_or("bulk delete failed")
                )),
            });
        }
        Ok(outcomes)
    }
}
