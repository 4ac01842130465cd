use std::sync::Arc;

use async_trait::async_trait;
use blobflow_core::{BlobResult, CredentialKind};
use object_store::ObjectStore;

/// An authenticated session against one storage account.
///
/// Blob I/O goes through the per-container [`ObjectStore`] returned by
/// [`container_store`](BlobService::container_store); only container
/// enumeration is account-scoped.
#[async_trait]
pub trait BlobService: Send + Sync {
    fn credential_kind(&self) -> CredentialKind;

    /// Base URL used in blob references, e.g. `https://acct.blob.core.windows.net`.
    fn account_url(&self) -> String;

    async fn list_containers(&self) -> BlobResult<Vec<String>>;

    /// A store rooted at `container`. Building it does not touch the network.
    fn container_store(&self, container: &str) -> BlobResult<Arc<dyn ObjectStore>>;
}
