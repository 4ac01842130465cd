#[cfg(feature = "storage-azure")]
use crate::AzureBlobService;
use crate::{BlobService, MemoryBlobService};
use blobflow_core::{AzureBlobStorageConfig, BlobResult, Credential};
use std::sync::Arc;

/// Opens authenticated storage sessions.
pub struct StorageClientFactory;

impl StorageClientFactory {
    /// Create a session for the configured account.
    ///
    /// The credential strategy is chosen here, once: a service principal
    /// when one is configured, the shared account key otherwise.
    pub fn create(config: &AzureBlobStorageConfig) -> BlobResult<Arc<dyn BlobService>> {
        let credential = Credential::from_config(config)?;

        tracing::info!(
            account = %config.storage_account_name,
            account_url = %config.account_url(),
            credential_kind = %credential.kind(),
            "Creating blob storage session"
        );

        Self::connect(config, credential)
    }

    #[cfg(feature = "storage-azure")]
    fn connect(config: &AzureBlobStorageConfig, credential: Credential) -> BlobResult<Arc<dyn BlobService>> {
        let service = AzureBlobService::new(config, credential)?;
        Ok(Arc::new(service))
    }

    #[cfg(not(feature = "storage-azure"))]
    fn connect(_config: &AzureBlobStorageConfig, _credential: Credential) -> BlobResult<Arc<dyn BlobService>> {
        Err(blobflow_core::BlobError::InvalidConfiguration(
            "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
        ))
    }

    /// In-process session holding the given (empty) containers.
    pub fn in_memory<I, S>(containers: I) -> Arc<dyn BlobService>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(MemoryBlobService::new(containers))
    }
}
