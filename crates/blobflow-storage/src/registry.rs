//! Container registry
//!
//! Enumerates the account's containers once and owns the cache of
//! container handles. The cache is the only shared mutable state in a
//! storage session; population on a miss is serialized behind the write
//! lock so a name never maps to two handles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use blobflow_core::{BlobDescriptor, BlobError, BlobResult, ContainerSummary};
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{Attribute, Error as ObjectStoreError, GetOptions, ObjectMeta, ObjectStore};
use tokio::sync::RwLock;

use crate::service::BlobService;

/// Property lookups in flight per listing.
const PROPERTIES_CONCURRENCY: usize = 8;

/// A live, container-scoped connection. Clones share the same underlying
/// store; use [`same_handle`](Self::same_handle) to compare identity.
#[derive(Clone)]
pub struct ContainerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    store: Arc<dyn ObjectStore>,
}

impl ContainerHandle {
    fn new(name: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                store,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    pub fn same_handle(&self, other: &ContainerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Size, modification time and declared content type of one blob.
    pub async fn properties(&self, blob: &str) -> object_store::Result<BlobDescriptor> {
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        let result = self.store().get_opts(&Path::from(blob), options).await?;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| v.to_string());
        Ok(descriptor(&result.meta, content_type))
    }
}

impl fmt::Debug for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("name", &self.inner.name)
            .finish()
    }
}

fn descriptor(meta: &ObjectMeta, content_type: Option<String>) -> BlobDescriptor {
    BlobDescriptor {
        name: meta.location.to_string(),
        size: meta.size,
        content_type,
        last_modified: meta.last_modified,
    }
}

pub struct ContainerRegistry {
    service: Arc<dyn BlobService>,
    container_names: Vec<String>,
    handles: RwLock<HashMap<String, ContainerHandle>>,
}

impl ContainerRegistry {
    /// Enumerate the account's containers and register a handle for each.
    pub async fn new(service: Arc<dyn BlobService>) -> BlobResult<Self> {
        let start = Instant::now();
        let container_names = service.list_containers().await?;

        // A container whose store cannot be built stays listed but
        // unregistered; operations on it report ContainerNotFound.
        let mut handles = HashMap::with_capacity(container_names.len());
        for name in &container_names {
            match service.container_store(name) {
                Ok(store) => {
                    handles.insert(name.clone(), ContainerHandle::new(name.clone(), store));
                }
                Err(e) => tracing::error!(error = %e, container = %name, "Container handle creation failed"),
            }
        }

        tracing::info!(
            account_url = %service.account_url(),
            container_count = container_names.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Container registry initialized"
        );

        Ok(Self {
            service,
            container_names,
            handles: RwLock::new(handles),
        })
    }

    pub fn service(&self) -> &Arc<dyn BlobService> {
        &self.service
    }

    /// Container names as enumerated at construction.
    pub fn list_containers(&self) -> Vec<String> {
        self.container_names.clone()
    }

    /// The registered handle for `name`, if any. Never creates one.
    pub async fn handle(&self, name: &str) -> Option<ContainerHandle> {
        self.handles.read().await.get(name).cloned()
    }

    pub async fn get_or_create_handle(&self, name: &str) -> BlobResult<ContainerHandle> {
        if let Some(handle) = self.handles.read().await.get(name) {
            return Ok(handle.clone());
        }

        let mut handles = self.handles.write().await;
        // Another caller may have created it while we waited for the lock.
        if let Some(handle) = handles.get(name) {
            return Ok(handle.clone());
        }

        let handle = ContainerHandle::new(name, self.service.container_store(name)?);
        handles.insert(name.to_string(), handle.clone());
        tracing::debug!(container = %name, "Container handle created");
        Ok(handle)
    }

    /// Blobs of a registered container whose names start with `prefix`.
    pub async fn list_blobs(
        &self,
        container: &str,
        prefix: Option<&str>,
    ) -> BlobResult<Vec<BlobDescriptor>> {
        let handle = self
            .handle(container)
            .await
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?;
        let start = Instant::now();

        // object_store lists whole path segments; narrow to the last complete
        // segment and apply the string prefix here.
        let listing_root = prefix
            .and_then(|p| p.rsplit_once('/'))
            .map(|(dir, _)| Path::from(dir));

        let metas: Vec<ObjectMeta> = handle
            .store()
            .list(listing_root.as_ref())
            .try_collect()
            .await
            .map_err(|e| match e {
                ObjectStoreError::NotFound { .. } => BlobError::ContainerNotFound(container.to_string()),
                other => {
                    tracing::error!(
                        error = %other,
                        container = %container,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Blob listing failed"
                    );
                    BlobError::Backend(other.to_string())
                }
            })?;

        let matching = metas.into_iter().filter(|meta| match prefix {
            Some(p) => meta.location.as_ref().starts_with(p),
            None => true,
        });

        let blobs: Vec<BlobDescriptor> = futures::stream::iter(matching)
            .map(|meta| {
                let handle = handle.clone();
                async move {
                    let content_type = match handle.properties(meta.location.as_ref()).await {
                        Ok(props) => props.content_type,
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                container = %handle.name(),
                                blob = %meta.location,
                                "Could not read blob content type"
                            );
                            None
                        }
                    };
                    descriptor(&meta, content_type)
                }
            })
            .buffered(PROPERTIES_CONCURRENCY)
            .collect()
            .await;

        tracing::info!(
            container = %container,
            prefix = prefix.unwrap_or(""),
            blob_count = blobs.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob listing successful"
        );
        Ok(blobs)
    }

    /// One summary per enumerated container. A container that cannot be
    /// listed is logged and left out of the report.
    pub async fn describe_containers(&self) -> Vec<ContainerSummary> {
        let mut summaries = Vec::with_capacity(self.container_names.len());

        for name in &self.container_names {
            let blobs = match self.list_blobs(name, None).await {
                Ok(blobs) => blobs,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        container = %name,
                        "Failed to retrieve information for container"
                    );
                    continue;
                }
            };

            let summary = ContainerSummary::from_blobs(name.clone(), &blobs);
            tracing::info!(
                container = %summary.name,
                blob_count = summary.blob_count,
                total_size_bytes = summary.total_size_bytes,
                earliest_modified = ?summary.earliest_modified,
                latest_modified = ?summary.latest_modified,
                "Container summary"
            );
            for blob in &blobs {
                tracing::debug!(
                    container = %name,
                    blob = %blob.name,
                    size_bytes = blob.size,
                    content_type = blob.content_type.as_deref().unwrap_or(""),
                    last_modified = %blob.last_modified,
                    "Blob"
                );
            }
            summaries.push(summary);
        }

        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBlobService;
    use async_trait::async_trait;
    use blobflow_core::CredentialKind;
    use bytes::Bytes;
    use object_store::{ObjectStoreExt, PutPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how many stores the registry asks for.
    struct CountingService {
        inner: MemoryBlobService,
        stores_built: AtomicUsize,
    }

    #[async_trait]
    impl BlobService for CountingService {
        fn credential_kind(&self) -> CredentialKind {
            self.inner.credential_kind()
        }

        fn account_url(&self) -> String {
            self.inner.account_url()
        }

        async fn list_containers(&self) -> BlobResult<Vec<String>> {
            self.inner.list_containers().await
        }

        fn container_store(&self, container: &str) -> BlobResult<Arc<dyn ObjectStore>> {
            self.stores_built.fetch_add(1, Ordering::SeqCst);
            self.inner.container_store(container)
        }
    }

    async fn put(handle: &ContainerHandle, name: &str, data: &'static [u8]) {
        handle
            .store()
            .put(&Path::from(name), PutPayload::from(Bytes::from_static(data)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_misses_create_one_handle() {
        let service = Arc::new(CountingService {
            inner: MemoryBlobService::new(["existing"]),
            stores_built: AtomicUsize::new(0),
        });
        let registry = Arc::new(ContainerRegistry::new(service.clone()).await.unwrap());
        assert_eq!(service.stores_built.load(Ordering::SeqCst), 1);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create_handle("fresh").await.unwrap() })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.iter().all(|h| h.same_handle(&handles[0])));
        assert_eq!(service.stores_built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregistered_container_is_not_found() {
        let registry = ContainerRegistry::new(Arc::new(MemoryBlobService::new(["docs"])))
            .await
            .unwrap();

        let err = registry.list_blobs("nope", None).await.unwrap_err();
        assert!(matches!(err, BlobError::ContainerNotFound(name) if name == "nope"));
        assert!(registry.handle("nope").await.is_none());
    }

    #[tokio::test]
    async fn prefix_is_a_plain_string_prefix() {
        let registry = ContainerRegistry::new(Arc::new(MemoryBlobService::new(["docs"])))
            .await
            .unwrap();
        let handle = registry.get_or_create_handle("docs").await.unwrap();
        for name in ["folder/a.xlsx", "folder/b.xlsx", "folder2/c.xlsx", "c.xlsx"] {
            put(&handle, name, b"x").await;
        }

        let names = |blobs: Vec<BlobDescriptor>| blobs.into_iter().map(|b| b.name).collect::<Vec<_>>();
        assert_eq!(
            names(registry.list_blobs("docs", Some("folder/")).await.unwrap()),
            vec!["folder/a.xlsx", "folder/b.xlsx"]
        );
        assert_eq!(
            names(registry.list_blobs("docs", Some("fold")).await.unwrap()),
            vec!["folder/a.xlsx", "folder/b.xlsx", "folder2/c.xlsx"]
        );
        assert_eq!(registry.list_blobs("docs", None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn summary_counts_sizes() {
        let registry = ContainerRegistry::new(Arc::new(MemoryBlobService::new(["a", "b"])))
            .await
            .unwrap();
        let a = registry.get_or_create_handle("a").await.unwrap();
        put(&a, "one", b"12345").await;
        put(&a, "two", b"678").await;

        let summaries = registry.describe_containers().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "a");
        assert_eq!(summaries[0].blob_count, 2);
        assert_eq!(summaries[0].total_size_bytes, 8);
        assert_eq!(summaries[1].blob_count, 0);
        assert!(summaries[1].latest_modified.is_none());
    }
}
