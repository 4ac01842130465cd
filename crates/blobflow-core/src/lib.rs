//! Blobflow Core Library
//!
//! Configuration, credential selection, data models and the error taxonomy
//! shared by the processing, storage and CLI crates.

pub mod config;
pub mod credentials;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{
    build_connection_string, AzureBlobStorageConfig, ConnectionString, PipelineConfig,
    ServicePrincipalConfig,
};
pub use credentials::{Credential, CredentialKind};
pub use error::{BlobError, BlobResult, ErrorKind};
pub use models::{
    BlobDescriptor, ContainerSummary, DocumentFormat, ExtractionItem, ExtractionOutcome,
    ExtractionResult, ItemState, LoadedData, PipelineState, StorageConfig, Table, Value,
};
