//! In-process blob service for tests and local dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blobflow_core::{BlobResult, CredentialKind};
use object_store::memory::InMemory;
use object_store::ObjectStore;

use crate::service::BlobService;

const MEMORY_ACCOUNT_URL: &str = "memory://blobflow";

/// One [`InMemory`] store per container. Containers named at construction
/// are what [`list_containers`](BlobService::list_containers) reports; any
/// other name gets a fresh empty store on first use.
#[derive(Debug, Default)]
pub struct MemoryBlobService {
    containers: Mutex<BTreeMap<String, Arc<InMemory>>>,
    seeded: Vec<String>,
}

impl MemoryBlobService {
    pub fn new<I, S>(containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let seeded: Vec<String> = containers.into_iter().map(Into::into).collect();
        let stores = seeded
            .iter()
            .map(|name| (name.clone(), Arc::new(InMemory::new())))
            .collect();
        Self {
            containers: Mutex::new(stores),
            seeded,
        }
    }
}

#[async_trait]
impl BlobService for MemoryBlobService {
    fn credential_kind(&self) -> CredentialKind {
        CredentialKind::SharedKey
    }

    fn account_url(&self) -> String {
        MEMORY_ACCOUNT_URL.to_string()
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        Ok(self.seeded.clone())
    }

    fn container_store(&self, container: &str) -> BlobResult<Arc<dyn ObjectStore>> {
        let mut containers = self
            .containers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let store: Arc<dyn ObjectStore> = containers
            .entry(container.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::path::Path;
    use object_store::ObjectStoreExt;

    #[tokio::test]
    async fn same_container_shares_one_store() {
        let service = MemoryBlobService::new(["docs"]);
        let first = service.container_store("docs").unwrap();
        first
            .put(&Path::from("a.txt"), bytes::Bytes::from_static(b"a").into())
            .await
            .unwrap();

        let second = service.container_store("docs").unwrap();
        assert!(second.head(&Path::from("a.txt")).await.is_ok());
        assert_eq!(service.list_containers().await.unwrap(), vec!["docs".to_string()]);
    }
}
