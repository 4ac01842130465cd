//! Domain models shared by the storage and processing crates.

pub mod extraction;
pub mod storage;
pub mod table;

pub use extraction::{
    DocumentFormat, ExtractionItem, ExtractionOutcome, ExtractionResult, ItemState, PipelineState,
};
pub use storage::{BlobDescriptor, ContainerSummary, StorageConfig};
pub use table::{LoadedData, Table, Value};
