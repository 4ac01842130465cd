//! Storage manager
//!
//! The facade callers use: one session, one container registry, and the
//! three replaceable blob operation strategies, plus the composite
//! "download and parse into a table" operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use blobflow_core::{
    AzureBlobStorageConfig, BlobDescriptor, BlobError, BlobResult, ContainerSummary, LoadedData,
    PipelineConfig, StorageConfig, Table,
};
use blobflow_processing::content_type::{content_type_for_name, is_excel};
use blobflow_processing::{BlobSource, ExtractionPipeline, TableFormat};
use bytes::Bytes;
use indexmap::IndexMap;
use object_store::Error as ObjectStoreError;
use tokio::sync::RwLock;

use crate::factory::StorageClientFactory;
use crate::registry::{ContainerHandle, ContainerRegistry};
use crate::service::BlobService;
use crate::strategies::{
    DeleteStrategy, DownloadStrategy, ObjectStoreDelete, ObjectStoreDownload, ObjectStoreUpload,
    UploadSource, UploadStrategy,
};

pub struct StorageManager {
    registry: ContainerRegistry,
    upload: RwLock<Arc<dyn UploadStrategy>>,
    download: RwLock<Arc<dyn DownloadStrategy>>,
    delete: RwLock<Arc<dyn DeleteStrategy>>,
}

impl StorageManager {
    /// Open a session for `config` and enumerate its containers.
    pub async fn connect(config: &AzureBlobStorageConfig) -> BlobResult<Self> {
        let service = StorageClientFactory::create(config)?;
        Self::with_service(service, config.request_timeout).await
    }

    /// Build on an existing session, with the default strategies using
    /// `request_timeout` for every blob operation.
    pub async fn with_service(service: Arc<dyn BlobService>, request_timeout: Duration) -> BlobResult<Self> {
        let registry = ContainerRegistry::new(service).await?;
        Ok(Self {
            registry,
            upload: RwLock::new(Arc::new(ObjectStoreUpload::new(request_timeout))),
            download: RwLock::new(Arc::new(ObjectStoreDownload::new(request_timeout))),
            delete: RwLock::new(Arc::new(ObjectStoreDelete::new(request_timeout))),
        })
    }

    pub fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    pub fn account_url(&self) -> String {
        self.registry.service().account_url()
    }

    /// Location of `container/blob` in this session's account.
    pub fn location(&self, container: &str, blob: &str) -> StorageConfig {
        StorageConfig::new(self.account_url(), container, blob)
    }

    pub async fn set_upload_strategy(&self, strategy: Arc<dyn UploadStrategy>) {
        *self.upload.write().await = strategy;
    }

    pub async fn set_download_strategy(&self, strategy: Arc<dyn DownloadStrategy>) {
        *self.download.write().await = strategy;
    }

    pub async fn set_delete_strategy(&self, strategy: Arc<dyn DeleteStrategy>) {
        *self.delete.write().await = strategy;
    }

    /// Upload, overwriting any existing blob. Without an explicit content
    /// type one is inferred from the blob name's extension.
    pub async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        data: impl Into<UploadSource>,
        content_type: Option<&str>,
    ) -> BlobResult<u64> {
        let handle = self.registry.get_or_create_handle(container).await?;
        let content_type = content_type.unwrap_or_else(|| content_type_for_name(blob));
        let strategy = self.upload.read().await.clone();
        strategy.upload(&handle, blob, data.into(), content_type).await
    }

    pub async fn download_blob(&self, container: &str, blob: &str) -> BlobResult<Bytes> {
        let handle = self.registry.get_or_create_handle(container).await?;
        let strategy = self.download.read().await.clone();
        strategy.download(&handle, blob).await
    }

    pub async fn delete_blob(&self, container: &str, blob: &str) -> BlobResult<()> {
        let handle = self.registry.get_or_create_handle(container).await?;
        let strategy = self.delete.read().await.clone();
        strategy.delete(&handle, blob).await
    }

    pub async fn list_blobs(&self, container: &str, prefix: Option<&str>) -> BlobResult<Vec<BlobDescriptor>> {
        self.registry.list_blobs(container, prefix).await
    }

    pub fn list_containers(&self) -> Vec<String> {
        self.registry.list_containers()
    }

    pub async fn describe_containers(&self) -> Vec<ContainerSummary> {
        self.registry.describe_containers().await
    }

    pub async fn blob_properties(&self, container: &str, blob: &str) -> BlobResult<BlobDescriptor> {
        let handle = self.registry.get_or_create_handle(container).await?;
        properties(&handle, blob).await
    }

    /// Download `blob` and parse it by its declared content type. Workbooks
    /// come back with every sheet.
    pub async fn load_blob_to_table(&self, container: &str, blob: &str) -> BlobResult<LoadedData> {
        let handle = self.registry.get_or_create_handle(container).await?;
        let props = properties(&handle, blob).await?;
        let bytes = self.download_blob(container, blob).await?;
        let content_type = props.content_type.unwrap_or_default();

        parse_blocking(blob, move || {
            blobflow_processing::load(&bytes, &content_type, None)
        })
        .await
    }

    /// Load one sheet of an Excel blob (the first sheet when `sheet` is
    /// `None`). Any other declared content type is rejected, whatever the
    /// bytes contain.
    pub async fn load_blob_sheet_to_table(
        &self,
        container: &str,
        blob: &str,
        sheet: Option<&str>,
    ) -> BlobResult<Table> {
        let handle = self.registry.get_or_create_handle(container).await?;
        let props = properties(&handle, blob).await?;
        let content_type = props.content_type.unwrap_or_default();
        if !is_excel(&content_type) {
            tracing::warn!(
                container = %container,
                blob = %blob,
                content_type = %content_type,
                "Sheet load requested for a non-Excel blob"
            );
            return Err(BlobError::UnsupportedContentType(content_type));
        }

        let bytes = self.download_blob(container, blob).await?;
        let sheet = sheet.map(str::to_string);
        parse_blocking(blob, move || {
            blobflow_processing::load_table(&bytes, &content_type, sheet.as_deref())
        })
        .await
    }

    /// Every loadable blob of `container` as a table. Workbook sheets are
    /// keyed `"{blob} - {sheet}"`; blobs that fail to load are logged and
    /// skipped.
    pub async fn load_blobs_to_tables(&self, container: &str) -> BlobResult<IndexMap<String, Table>> {
        let start = Instant::now();
        let blobs = self.list_blobs(container, None).await?;
        let mut tables = IndexMap::new();

        for blob in blobs {
            tracing::info!(container = %container, blob = %blob.name, "Loading blob");
            match self.load_blob_to_table(container, &blob.name).await {
                Ok(LoadedData::Table(table)) => {
                    tables.insert(blob.name, table);
                }
                Ok(LoadedData::Sheets(sheets)) => {
                    for (sheet, table) in sheets {
                        tables.insert(format!("{} - {}", blob.name, sheet), table);
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        error_code = e.error_code(),
                        container = %container,
                        blob = %blob.name,
                        "Failed to load blob"
                    );
                }
            }
        }

        tracing::info!(
            container = %container,
            table_count = tables.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Container loaded into tables"
        );
        Ok(tables)
    }

    /// Serialize `table` and upload it with the format's content type.
    pub async fn upload_table(
        &self,
        container: &str,
        blob: &str,
        table: &Table,
        format: TableFormat,
    ) -> BlobResult<u64> {
        let bytes = format.write(table)?;
        tracing::debug!(
            container = %container,
            blob = %blob,
            format = %format,
            rows = table.row_count(),
            "Table serialized for upload"
        );
        self.upload_blob(container, blob, bytes, Some(format.content_type()))
            .await
    }

    /// Extraction pipeline that downloads through this manager.
    pub fn extraction_pipeline(self: &Arc<Self>, config: &PipelineConfig) -> ExtractionPipeline {
        ExtractionPipeline::from_config(self.clone(), config)
    }
}

async fn properties(handle: &ContainerHandle, blob: &str) -> BlobResult<BlobDescriptor> {
    handle.properties(blob).await.map_err(|e| match e {
        ObjectStoreError::NotFound { .. } => BlobError::BlobNotFound {
            container: handle.name().to_string(),
            blob: blob.to_string(),
        },
        other => {
            tracing::error!(
                error = %other,
                container = %handle.name(),
                blob = %blob,
                "Reading blob properties failed"
            );
            BlobError::Backend(other.to_string())
        }
    })
}

/// Run a parser off the async workers.
async fn parse_blocking<T, F>(blob: &str, parse: F) -> BlobResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> BlobResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(parse)
        .await
        .map_err(|e| BlobError::Backend(format!("parsing {} panicked: {}", blob, e)))?
}

#[async_trait]
impl BlobSource for StorageManager {
    async fn fetch(&self, location: &StorageConfig) -> BlobResult<Bytes> {
        self.download_blob(&location.container_name, &location.blob_name)
            .await
    }
}
