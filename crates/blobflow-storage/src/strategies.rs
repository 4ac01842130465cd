//! Blob operation strategies
//!
//! Upload, download and delete are separate traits so each can be swapped
//! on a running [`StorageManager`](crate::StorageManager). The shipped
//! implementations work against any container handle and carry only their
//! per-call timeout.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use blobflow_core::{BlobError, BlobResult};
use bytes::Bytes;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, Error as ObjectStoreError, ObjectStoreExt, PutOptions,
    PutPayload,
};

use crate::registry::ContainerHandle;

/// What to upload: bytes already in memory, or a file to read.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Bytes),
    File(PathBuf),
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(Bytes::from(bytes))
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::File(path)
    }
}

#[async_trait]
pub trait UploadStrategy: Send + Sync {
    /// Write `data` to `blob`, replacing any existing blob of that name.
    /// Returns the number of bytes written.
    async fn upload(
        &self,
        handle: &ContainerHandle,
        blob: &str,
        data: UploadSource,
        content_type: &str,
    ) -> BlobResult<u64>;
}

#[async_trait]
pub trait DownloadStrategy: Send + Sync {
    async fn download(&self, handle: &ContainerHandle, blob: &str) -> BlobResult<Bytes>;
}

#[async_trait]
pub trait DeleteStrategy: Send + Sync {
    /// Fails with [`BlobError::BlobNotFound`] when `blob` does not exist.
    async fn delete(&self, handle: &ContainerHandle, blob: &str) -> BlobResult<()>;
}

/// Run `op` under `timeout`; expiry is reported through `on_timeout` as the
/// operation's ordinary failure kind.
async fn with_timeout<T, F>(
    timeout: Duration,
    op: F,
    on_timeout: impl FnOnce(String) -> BlobError,
) -> BlobResult<T>
where
    F: Future<Output = BlobResult<T>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("timed out after {:?}", timeout))),
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStoreUpload {
    timeout: Duration,
}

impl ObjectStoreUpload {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn put(
        &self,
        handle: &ContainerHandle,
        blob: &str,
        data: UploadSource,
        content_type: &str,
    ) -> BlobResult<u64> {
        let failed = |cause: String| BlobError::UploadFailed {
            blob: blob.to_string(),
            cause,
        };

        let bytes = match data {
            UploadSource::Bytes(bytes) => bytes,
            UploadSource::File(path) => {
                tracing::debug!(path = %path.display(), blob = %blob, "Reading upload source file");
                let contents = tokio::fs::read(&path)
                    .await
                    .map_err(|e| failed(format!("reading {}: {}", path.display(), e)))?;
                Bytes::from(contents)
            }
        };
        let size = bytes.len() as u64;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, AttributeValue::from(content_type.to_string()));
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        handle
            .store()
            .put_opts(&Path::from(blob), PutPayload::from(bytes), options)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(size)
    }
}

#[async_trait]
impl UploadStrategy for ObjectStoreUpload {
    async fn upload(
        &self,
        handle: &ContainerHandle,
        blob: &str,
        data: UploadSource,
        content_type: &str,
    ) -> BlobResult<u64> {
        let start = Instant::now();
        let result = with_timeout(
            self.timeout,
            self.put(handle, blob, data, content_type),
            |cause| BlobError::UploadFailed {
                blob: blob.to_string(),
                cause,
            },
        )
        .await;

        match result {
            Ok(size) => {
                tracing::info!(
                    container = %handle.name(),
                    blob = %blob,
                    content_type = %content_type,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob upload successful"
                );
                Ok(size)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %handle.name(),
                    blob = %blob,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob upload failed"
                );
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectStoreDownload {
    timeout: Duration,
}

impl ObjectStoreDownload {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DownloadStrategy for ObjectStoreDownload {
    async fn download(&self, handle: &ContainerHandle, blob: &str) -> BlobResult<Bytes> {
        let start = Instant::now();
        let location = Path::from(blob);

        let fetch = async {
            let result = handle.store().get(&location).await;
            let result = result.map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => BlobError::BlobNotFound {
                    container: handle.name().to_string(),
                    blob: blob.to_string(),
                },
                other => BlobError::DownloadFailed {
                    blob: blob.to_string(),
                    cause: other.to_string(),
                },
            })?;
            result.bytes().await.map_err(|e| BlobError::DownloadFailed {
                blob: blob.to_string(),
                cause: e.to_string(),
            })
        };

        let result = with_timeout(self.timeout, fetch, |cause| BlobError::DownloadFailed {
            blob: blob.to_string(),
            cause,
        })
        .await;

        match result {
            Ok(bytes) => {
                tracing::info!(
                    container = %handle.name(),
                    blob = %blob,
                    size_bytes = bytes.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob download successful"
                );
                Ok(bytes)
            }
            Err(e @ BlobError::BlobNotFound { .. }) => {
                tracing::warn!(container = %handle.name(), blob = %blob, "Blob not found");
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %handle.name(),
                    blob = %blob,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Blob download failed"
                );
                Err(e)
            }
        }
    }
}

/// Checks existence before deleting, so a missing blob is reported the
/// same way on every backend.
#[derive(Debug, Clone)]
pub struct ObjectStoreDelete {
    timeout: Duration,
}

impl ObjectStoreDelete {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DeleteStrategy for ObjectStoreDelete {
    async fn delete(&self, handle: &ContainerHandle, blob: &str) -> BlobResult<()> {
        let start = Instant::now();
        let location = Path::from(blob);
        let failed = |cause: String| BlobError::DeleteFailed {
            blob: blob.to_string(),
            cause,
        };

        let remove = async {
            match handle.store().head(&location).await {
                Ok(_) => {}
                Err(ObjectStoreError::NotFound { .. }) => {
                    return Err(BlobError::BlobNotFound {
                        container: handle.name().to_string(),
                        blob: blob.to_string(),
                    })
                }
                Err(e) => return Err(failed(e.to_string())),
            }
            handle
                .store()
                .delete(&location)
                .await
                .map_err(|e| failed(e.to_string()))
        };

        let result = with_timeout(self.timeout, remove, failed).await;

        match &result {
            Ok(()) => tracing::info!(
                container = %handle.name(),
                blob = %blob,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Blob delete successful"
            ),
            Err(e) => tracing::error!(
                error = %e,
                container = %handle.name(),
                blob = %blob,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Blob delete failed"
            ),
        }
        result
    }
}
