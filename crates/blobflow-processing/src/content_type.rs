//! Content-type resolution: MIME string to parsing strategy.

use std::fmt;

pub const CSV: &str = "text/csv";
pub const EXCEL_OPENXML: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const EXCEL_LEGACY: &str = "application/vnd.ms-excel";
pub const JSON: &str = "application/json";
pub const PARQUET: &str = "application/octet-stream";
pub const HTML: &str = "text/html";
pub const XML: &str = "text/xml";

/// Parsing strategy selected by a blob's content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    Csv,
    Excel,
    Json,
    Parquet,
    Html,
    Xml,
    Unsupported,
}

impl ParserKind {
    pub fn is_supported(self) -> bool {
        self != ParserKind::Unsupported
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParserKind::Csv => "csv",
            ParserKind::Excel => "excel",
            ParserKind::Json => "json",
            ParserKind::Parquet => "parquet",
            ParserKind::Html => "html",
            ParserKind::Xml => "xml",
            ParserKind::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Exact, case-sensitive match against the fixed table. Parameters such as
/// `; charset=utf-8` are not stripped, so they resolve to `Unsupported`.
pub fn resolve(content_type: &str) -> ParserKind {
    match content_type {
        CSV => ParserKind::Csv,
        EXCEL_OPENXML | EXCEL_LEGACY => ParserKind::Excel,
        JSON => ParserKind::Json,
        PARQUET => ParserKind::Parquet,
        HTML => ParserKind::Html,
        XML => ParserKind::Xml,
        _ => ParserKind::Unsupported,
    }
}

pub fn is_excel(content_type: &str) -> bool {
    resolve(content_type) == ParserKind::Excel
}

/// Content type to store with an upload when the caller gives none.
pub fn content_type_for_name(blob_name: &str) -> &'static str {
    let extension = blob_name
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => CSV,
        Some("xlsx") => EXCEL_OPENXML,
        Some("xls") => EXCEL_LEGACY,
        Some("json") => JSON,
        Some("html") | Some("htm") => HTML,
        Some("xml") => XML,
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => PARQUET,
    }
}
