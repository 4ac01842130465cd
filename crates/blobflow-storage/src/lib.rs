//! Blobflow Storage Library
//!
//! Authenticated blob storage sessions, the container registry, pluggable
//! upload/download/delete strategies, and the [`StorageManager`] facade
//! that ties them to the table loader and the extraction pipeline.

#[cfg(feature = "storage-azure")]
pub mod azure;
pub mod factory;
pub mod manager;
pub mod memory;
pub mod registry;
pub mod service;
pub mod strategies;

#[cfg(feature = "storage-azure")]
pub use azure::AzureBlobService;
pub use factory::StorageClientFactory;
pub use manager::StorageManager;
pub use memory::MemoryBlobService;
pub use registry::{ContainerHandle, ContainerRegistry};
pub use service::BlobService;
pub use strategies::{
    DeleteStrategy, DownloadStrategy, ObjectStoreDelete, ObjectStoreDownload, ObjectStoreUpload,
    UploadSource, UploadStrategy,
};
