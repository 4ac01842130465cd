//! Blobflow Processing Library
//!
//! Turns raw blob bytes into something useful: content-type driven table
//! loading, table writers, per-format text extractors, and the bounded
//! parallel extraction pipeline.

pub mod content_type;
pub mod extractors;
pub mod loader;
pub mod pipeline;
pub mod writer;

pub use content_type::{content_type_for_name, resolve, ParserKind};
pub use extractors::{ExtractorRegistry, FormatExtractor};
pub use loader::{filter_parquet_part_files, load, load_table, sheet_names};
pub use pipeline::{BatchProgress, BlobSource, ExtractionPipeline};
pub use writer::{write_csv, write_json, write_parquet, TableFormat};

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;
