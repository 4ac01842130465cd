//! Blobflow CLI: blob storage operations and batch text extraction.
//!
//! Reads the storage account from the environment (or `.env`):
//! STORAGE_ACCOUNT_NAME plus STORAGE_ACCOUNT_KEY, or the service principal
//! triple APPLICATION_ID / CLIENT_SECRET / AZURE_TENANT_ID.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use blobflow_cli::{error_code, init_tracing, parse_blob_ref};
use blobflow_core::{AzureBlobStorageConfig, ExtractionItem, PipelineConfig};
use blobflow_storage::{StorageManager, UploadSource};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "blobflow", about = "Blob storage and document extraction CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the account's containers
    ListContainers,
    /// List blobs in a container
    ListBlobs {
        container: String,
        /// Only blobs whose names start with this string
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Blob count, total size and modification range for every container
    Describe,
    /// Upload a local file, replacing any existing blob
    Upload {
        container: String,
        blob: String,
        file: PathBuf,
        /// Content type to store; inferred from the blob name when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a blob to a file, or to stdout
    Download {
        container: String,
        blob: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a blob
    Delete { container: String, blob: String },
    /// Parse a blob into a table and print it as JSON
    Load {
        container: String,
        blob: String,
        /// Excel sheet to load (Excel blobs only)
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Extract text from documents given as <container>/<blob>
    Extract {
        #[arg(required = true)]
        blobs: Vec<String>,
        /// Documents processed at once (default: EXTRACTION_MAX_CONCURRENCY or 5)
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AzureBlobStorageConfig::from_env().context("Failed to load storage configuration")?;
    let manager = Arc::new(
        StorageManager::connect(&config)
            .await
            .context("Failed to open storage session")?,
    );

    match cli.command {
        Commands::ListContainers => {
            print_json(&manager.list_containers())?;
        }
        Commands::ListBlobs { container, prefix } => {
            let blobs = manager.list_blobs(&container, prefix.as_deref()).await?;
            print_json(&blobs)?;
        }
        Commands::Describe => {
            print_json(&manager.describe_containers().await)?;
        }
        Commands::Upload {
            container,
            blob,
            file,
            content_type,
        } => {
            let size = manager
                .upload_blob(&container, &blob, UploadSource::File(file), content_type.as_deref())
                .await
                .with_context(|| format!("Failed to upload {}/{}", container, blob))?;
            println!("Uploaded {} bytes to {}/{}", size, container, blob);
        }
        Commands::Download { container, blob, out } => {
            let bytes = manager
                .download_blob(&container, &blob)
                .await
                .with_context(|| format!("Failed to download {}/{}", container, blob))?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), size_bytes = bytes.len(), "Blob saved");
                }
                None => {
                    use tokio::io::AsyncWriteExt;
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&bytes).await.context("Failed to write to stdout")?;
                    stdout.flush().await.context("Failed to flush stdout")?;
                }
            }
        }
        Commands::Delete { container, blob } => {
            manager
                .delete_blob(&container, &blob)
                .await
                .with_context(|| format!("Failed to delete {}/{}", container, blob))?;
            println!("Deleted {}/{}", container, blob);
        }
        Commands::Load {
            container,
            blob,
            sheet,
        } => match sheet {
            Some(sheet) => {
                let table = manager
                    .load_blob_sheet_to_table(&container, &blob, Some(&sheet))
                    .await?;
                print_json(&table)?;
            }
            None => {
                print_json(&manager.load_blob_to_table(&container, &blob).await?)?;
            }
        },
        Commands::Extract {
            blobs,
            max_concurrency,
        } => {
            let mut pipeline_config = PipelineConfig::from_env()?;
            if let Some(limit) = max_concurrency {
                pipeline_config.max_concurrency = limit;
            }

            let items = blobs
                .iter()
                .map(|reference| {
                    let (container, blob) = parse_blob_ref(reference)?;
                    Ok(ExtractionItem::from_location(manager.location(&container, &blob)))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let pipeline = manager.extraction_pipeline(&pipeline_config);
            let results = pipeline.run(items).await;
            print_json(&results)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {:#}", error_code(&e), e);
            ExitCode::FAILURE
        }
    }
}
