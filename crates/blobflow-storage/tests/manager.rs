use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobflow_core::{BlobError, BlobResult, CredentialKind, ErrorKind, LoadedData, Table, Value};
use blobflow_processing::content_type;
use blobflow_processing::fixtures::xlsx_fixture;
use blobflow_processing::TableFormat;
use blobflow_storage::{
    BlobService, ContainerHandle, DownloadStrategy, MemoryBlobService, StorageManager,
};
use bytes::Bytes;
use object_store::ObjectStore;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn manager(containers: &[&str]) -> StorageManager {
    let service = Arc::new(MemoryBlobService::new(containers.iter().copied()));
    StorageManager::with_service(service, TIMEOUT).await.unwrap()
}

#[tokio::test]
async fn upload_then_download_returns_the_same_bytes() {
    let manager = manager(&["test"]).await;

    manager
        .upload_blob("test", "greeting.txt", Bytes::from_static(b"Hello, world!"), None)
        .await
        .unwrap();
    let downloaded = manager.download_blob("test", "greeting.txt").await.unwrap();

    assert_eq!(&downloaded[..], b"Hello, world!");
}

#[tokio::test]
async fn prefix_listing_returns_only_matching_blobs() {
    let manager = manager(&["reports"]).await;
    for name in ["folder/a.xlsx", "folder/b.xlsx", "c.xlsx"] {
        manager
            .upload_blob("reports", name, b"x".to_vec(), None)
            .await
            .unwrap();
    }

    let names: Vec<String> = manager
        .list_blobs("reports", Some("folder/"))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert_eq!(names, vec!["folder/a.xlsx", "folder/b.xlsx"]);
}

#[tokio::test]
async fn listing_reports_inferred_content_types() {
    let manager = manager(&["data"]).await;
    manager.upload_blob("data", "t.csv", b"a\n1\n".to_vec(), None).await.unwrap();
    manager
        .upload_blob("data", "blob.weird", b"?".to_vec(), None)
        .await
        .unwrap();

    let blobs = manager.list_blobs("data", None).await.unwrap();
    assert_eq!(blobs[0].name, "blob.weird");
    assert_eq!(blobs[0].content_type.as_deref(), Some("application/octet-stream"));
    assert_eq!(blobs[1].content_type.as_deref(), Some(content_type::CSV));
    assert_eq!(blobs[1].size, 4);
}

#[tokio::test]
async fn missing_blob_is_a_distinct_not_found_error() {
    let manager = manager(&["test"]).await;

    let err = manager.download_blob("test", "nope.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlobNotFound);
    assert!(err.is_not_found());
    assert_eq!(err.http_status_code(), 404);

    let err = manager.delete_blob("test", "nope.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlobNotFound);
}

#[tokio::test]
async fn deleted_blob_can_no_longer_be_downloaded() {
    let manager = manager(&["test"]).await;
    manager.upload_blob("test", "tmp.txt", b"x".to_vec(), None).await.unwrap();

    manager.delete_blob("test", "tmp.txt").await.unwrap();

    let err = manager.download_blob("test", "tmp.txt").await.unwrap_err();
    assert!(matches!(err, BlobError::BlobNotFound { .. }));
}

#[tokio::test]
async fn listing_an_unknown_container_fails() {
    let manager = manager(&["test"]).await;
    let err = manager.list_blobs("elsewhere", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
}

#[tokio::test]
async fn sheet_load_rejects_non_excel_content_types() {
    let manager = manager(&["books"]).await;
    // Real workbook bytes, declared as CSV.
    let workbook = xlsx_fixture(&[("Sheet1", vec![vec!["a"], vec!["1"]])]);
    manager
        .upload_blob("books", "book.xlsx", workbook, Some(content_type::CSV))
        .await
        .unwrap();

    let err = manager
        .load_blob_sheet_to_table("books", "book.xlsx", Some("Sheet1"))
        .await
        .unwrap_err();
    assert!(matches!(err, BlobError::UnsupportedContentType(ct) if ct == content_type::CSV));
}

#[tokio::test]
async fn sheet_load_reads_the_named_or_first_sheet() {
    let manager = manager(&["books"]).await;
    let workbook = xlsx_fixture(&[
        ("Summary", vec![vec!["total"], vec!["10"]]),
        ("Detail", vec![vec!["item", "qty"], vec!["bolt", "4"], vec!["nut", "6"]]),
    ]);
    manager
        .upload_blob("books", "stock.xlsx", workbook, None)
        .await
        .unwrap();

    let detail = manager
        .load_blob_sheet_to_table("books", "stock.xlsx", Some("Detail"))
        .await
        .unwrap();
    assert_eq!(detail.columns(), &["item".to_string(), "qty".to_string()]);
    assert_eq!(detail.row_count(), 2);

    let first = manager
        .load_blob_sheet_to_table("books", "stock.xlsx", None)
        .await
        .unwrap();
    assert_eq!(first.cell(0, "total"), Some(&Value::Int(10)));

    let err = manager
        .load_blob_sheet_to_table("books", "stock.xlsx", Some("Missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SheetNotFound);
}

#[tokio::test]
async fn load_blob_to_table_follows_the_declared_content_type() {
    let manager = manager(&["data"]).await;
    manager
        .upload_blob("data", "people.csv", b"name,age\nAda,36\nAlan,41\n".to_vec(), None)
        .await
        .unwrap();

    let loaded = manager.load_blob_to_table("data", "people.csv").await.unwrap();
    let table = loaded.into_table().unwrap();
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(1, "name"), Some(&Value::Text("Alan".to_string())));

    manager
        .upload_blob("data", "broken.json", b"{not json".to_vec(), None)
        .await
        .unwrap();
    let err = manager.load_blob_to_table("data", "broken.json").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedContent);
}

#[tokio::test]
async fn tables_round_trip_through_storage() {
    let manager = manager(&["tables"]).await;
    let table = Table::new(vec!["id".into(), "label".into()]).with_rows([
        vec![Value::Int(1), "one".into()],
        vec![Value::Int(2), "two".into()],
    ]);

    for (blob, format) in [
        ("t.csv", TableFormat::Csv),
        ("t.json", TableFormat::Json),
        ("t.parquet", TableFormat::Parquet),
    ] {
        manager.upload_table("tables", blob, &table, format).await.unwrap();
        let loaded = manager.load_blob_to_table("tables", blob).await.unwrap();
        assert_eq!(loaded, LoadedData::Table(table.clone()), "{format}");
    }
}

#[tokio::test]
async fn container_load_keys_sheets_and_skips_failures() {
    let manager = manager(&["mixed"]).await;
    manager
        .upload_blob("mixed", "a.csv", b"x\n1\n".to_vec(), None)
        .await
        .unwrap();
    manager
        .upload_blob(
            "mixed",
            "b.xlsx",
            xlsx_fixture(&[("One", vec![vec!["k"], vec!["v"]]), ("Two", vec![vec!["k"], vec!["w"]])]),
            None,
        )
        .await
        .unwrap();
    manager
        .upload_blob("mixed", "c.txt", b"plain text".to_vec(), Some("text/plain"))
        .await
        .unwrap();

    let tables = manager.load_blobs_to_tables("mixed").await.unwrap();
    let keys: Vec<&str> = tables.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a.csv", "b.xlsx - One", "b.xlsx - Two"]);
}

/// Serves the same bytes for every blob.
struct CannedDownload(Bytes);

#[async_trait]
impl DownloadStrategy for CannedDownload {
    async fn download(&self, _handle: &ContainerHandle, _blob: &str) -> BlobResult<Bytes> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn strategies_can_be_replaced_at_runtime() {
    let manager = manager(&["test"]).await;
    manager
        .set_download_strategy(Arc::new(CannedDownload(Bytes::from_static(b"canned"))))
        .await;

    let bytes = manager.download_blob("test", "anything").await.unwrap();
    assert_eq!(&bytes[..], b"canned");
}

/// Lists a container whose store cannot be built.
struct PartlyBrokenService {
    inner: MemoryBlobService,
}

#[async_trait]
impl BlobService for PartlyBrokenService {
    fn credential_kind(&self) -> CredentialKind {
        CredentialKind::SharedKey
    }

    fn account_url(&self) -> String {
        self.inner.account_url()
    }

    async fn list_containers(&self) -> BlobResult<Vec<String>> {
        Ok(vec!["good".to_string(), "broken".to_string()])
    }

    fn container_store(&self, container: &str) -> BlobResult<Arc<dyn ObjectStore>> {
        if container == "broken" {
            return Err(BlobError::InvalidConfiguration("no such store".to_string()));
        }
        self.inner.container_store(container)
    }
}

#[tokio::test]
async fn describe_skips_containers_that_fail() {
    let service = Arc::new(PartlyBrokenService {
        inner: MemoryBlobService::new(["good"]),
    });
    let manager = StorageManager::with_service(service, TIMEOUT).await.unwrap();
    manager
        .upload_blob("good", "file.bin", vec![0u8; 16], None)
        .await
        .unwrap();

    assert_eq!(manager.list_containers(), vec!["good", "broken"]);
    let summaries = manager.describe_containers().await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "good");
    assert_eq!(summaries[0].total_size_bytes, 16);
}

#[tokio::test]
async fn blob_properties_report_size_and_type() {
    let manager = manager(&["test"]).await;
    manager
        .upload_blob("test", "page.html", b"<table></table>".to_vec(), None)
        .await
        .unwrap();

    let props = manager.blob_properties("test", "page.html").await.unwrap();
    assert_eq!(props.size, 15);
    assert_eq!(props.content_type.as_deref(), Some(content_type::HTML));

    let err = manager.blob_properties("test", "absent").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BlobNotFound);
}
