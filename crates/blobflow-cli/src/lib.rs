use anyhow::anyhow;
use blobflow_core::BlobError;

/// Split `container/blob/path` at the first slash.
pub fn parse_blob_ref(reference: &str) -> anyhow::Result<(String, String)> {
    match reference.split_once('/') {
        Some((container, blob)) if !container.is_empty() && !blob.is_empty() => {
            Ok((container.to_string(), blob.to_string()))
        }
        _ => Err(anyhow!(
            "Invalid blob reference '{}'. Expected <container>/<blob>",
            reference
        )),
    }
}

/// Error code printed on failure: the storage error's code when there is
/// one anywhere in the chain.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BlobError>())
        .map(BlobError::error_code)
        .unwrap_or("INTERNAL_ERROR")
}


/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
