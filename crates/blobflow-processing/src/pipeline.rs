//! Parallel extraction pipeline
//!
//! Downloads and extracts a batch of documents with bounded concurrency.
//! Each item runs in its own task; a failure is recorded in that item's
//! result and never affects its siblings. Results come back in submission
//! order whatever the completion order was.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use blobflow_core::{
    BlobError, BlobResult, ExtractionItem, ExtractionResult, ItemState, PipelineConfig,
    PipelineState, StorageConfig,
};
use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::extractors::{ExtractorRegistry, FormatExtractor};

/// Where the pipeline gets blob bytes from. Implemented by the storage manager.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, location: &StorageConfig) -> BlobResult<Bytes>;
}

#[derive(Debug)]
struct ProgressInner {
    items: Vec<ItemState>,
    state: PipelineState,
}

/// Shared, cloneable view of a running batch.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    inner: Arc<Mutex<ProgressInner>>,
}

impl BatchProgress {
    pub fn new(item_count: usize) -> Self {
        let state = if item_count == 0 {
            PipelineState::Completed
        } else {
            PipelineState::Running
        };
        Self {
            inner: Arc::new(Mutex::new(ProgressInner {
                items: vec![ItemState::Pending; item_count],
                state,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressInner> {
        // A panicking item task cannot leave the state half-written; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every item's state, in submission order.
    pub fn items(&self) -> Vec<ItemState> {
        self.lock().items.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    pub fn finished_count(&self) -> usize {
        self.lock().items.iter().filter(|s| s.is_terminal()).count()
    }

    /// Move item `index` to `next`. Transitions that break the lifecycle
    /// are ignored, so a terminal state is never left.
    fn advance(&self, index: usize, next: ItemState) {
        let mut inner = self.lock();
        let Some(current) = inner.items.get(index).copied() else {
            return;
        };
        if !current.can_advance_to(next) {
            tracing::warn!(index, from = ?current, to = ?next, "Ignoring invalid item transition");
            return;
        }
        inner.items[index] = next;
        if inner.items.iter().all(|s| s.is_terminal()) {
            inner.state = PipelineState::Completed;
        }
    }
}

/// Bounded fan-out over a [`BlobSource`] and the extractor table.
pub struct ExtractionPipeline {
    source: Arc<dyn BlobSource>,
    registry: ExtractorRegistry,
    default_concurrency: usize,
}

impl ExtractionPipeline {
    pub fn new(source: Arc<dyn BlobSource>, registry: ExtractorRegistry) -> Self {
        Self {
            source,
            registry,
            default_concurrency: PipelineConfig::default().max_concurrency,
        }
    }

    pub fn from_config(source: Arc<dyn BlobSource>, config: &PipelineConfig) -> Self {
        Self {
            source,
            registry: ExtractorRegistry::new(config.temp_dir.clone()),
            default_concurrency: config.max_concurrency,
        }
    }

    /// Process with the configured concurrency limit.
    pub async fn run(&self, items: Vec<ExtractionItem>) -> Vec<ExtractionResult> {
        self.process_all(items, self.default_concurrency).await
    }

    /// One result per item, in the same order as `items`. At most
    /// `max_concurrency` items download or extract at once (0 is treated as 1).
    pub async fn process_all(
        &self,
        items: Vec<ExtractionItem>,
        max_concurrency: usize,
    ) -> Vec<ExtractionResult> {
        let progress = BatchProgress::new(items.len());
        self.process_all_tracked(items, max_concurrency, &progress).await
    }

    /// As [`process_all`](Self::process_all), reporting per-item states to
    /// `progress`, which must have been created for `items.len()` items.
    pub async fn process_all_tracked(
        &self,
        items: Vec<ExtractionItem>,
        max_concurrency: usize,
        progress: &BatchProgress,
    ) -> Vec<ExtractionResult> {
        let start = Instant::now();
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));

        tracing::info!(
            item_count = total,
            max_concurrency = max_concurrency.max(1),
            "Starting extraction batch"
        );

        let mut handles = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let extractor = match self.registry.get(&item.format) {
                Ok(extractor) => extractor,
                Err(e) => {
                    // No extractor: fail now without downloading anything.
                    tracing::warn!(
                        blob = %item.location.blob_name,
                        format = %item.format,
                        "Unsupported document format"
                    );
                    progress.advance(index, ItemState::Failed);
                    handles.push(Err(ExtractionResult::failed(&item, &e)));
                    continue;
                }
            };

            let source = self.source.clone();
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            let task_item = item.clone();

            let handle = tokio::spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let outcome =
                            fetch_and_extract(source.as_ref(), &task_item, extractor, &progress, index).await;
                        // Terminal state is recorded while the permit is still held.
                        let terminal = if outcome.is_ok() {
                            ItemState::Done
                        } else {
                            ItemState::Failed
                        };
                        progress.advance(index, terminal);
                        drop(permit);
                        outcome
                    }
                    Err(e) => {
                        progress.advance(index, ItemState::Failed);
                        Err(BlobError::Backend(format!("extraction semaphore closed: {}", e)))
                    }
                }
            });
            handles.push(Ok((item, handle)));
        }

        let mut results = Vec::with_capacity(total);
        for (index, entry) in handles.into_iter().enumerate() {
            let result = match entry {
                Err(failed) => failed,
                Ok((item, handle)) => {
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => {
                            progress.advance(index, ItemState::Failed);
                            Err(BlobError::extraction(
                                item.format.clone(),
                                format!("item task failed: {}", join_error),
                            ))
                        }
                    };
                    match outcome {
                        Ok(text) => {
                            tracing::debug!(
                                source = %item.location.reference(),
                                text_len = text.len(),
                                "Document extracted"
                            );
                            ExtractionResult::done(&item, text)
                        }
                        Err(e) => {
                            tracing::warn!(
                                source = %item.location.reference(),
                                error = %e,
                                error_code = e.error_code(),
                                "Document extraction failed"
                            );
                            ExtractionResult::failed(&item, &e)
                        }
                    }
                }
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.is_done()).count();
        tracing::info!(
            item_count = total,
            failed_count = failed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Extraction batch completed"
        );
        results
    }
}

/// Download one item and run its extractor off the async runtime.
async fn fetch_and_extract(
    source: &dyn BlobSource,
    item: &ExtractionItem,
    extractor: Arc<dyn FormatExtractor>,
    progress: &BatchProgress,
    index: usize,
) -> BlobResult<String> {
    progress.advance(index, ItemState::Downloading);
    let bytes = source.fetch(&item.location).await?;

    progress.advance(index, ItemState::Extracting);
    let hint = item.location.blob_name.clone();
    let format = item.format.clone();
    tokio::task::spawn_blocking(move || extractor.extract(&bytes, Some(hint.as_str())))
        .await
        .map_err(|e| BlobError::extraction(format, format!("extractor task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobflow_core::{DocumentFormat, ErrorKind};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory source that tracks how many fetches overlap.
    #[derive(Default)]
    struct FakeSource {
        blobs: HashMap<String, Bytes>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fetches: AtomicUsize,
        delays: HashMap<String, Duration>,
    }

    impl FakeSource {
        fn with(blobs: &[(&str, &[u8])]) -> Self {
            Self {
                blobs: blobs
                    .iter()
                    .map(|(name, data)| (name.to_string(), Bytes::copy_from_slice(data)))
                    .collect(),
                ..Default::default()
            }
        }

        fn with_delay(mut self, blob: &str, delay: Duration) -> Self {
            self.delays.insert(blob.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl BlobSource for FakeSource {
        async fn fetch(&self, location: &StorageConfig) -> BlobResult<Bytes> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = self
                .delays
                .get(&location.blob_name)
                .copied()
                .unwrap_or(Duration::from_millis(20));
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.blobs
                .get(&location.blob_name)
                .cloned()
                .ok_or_else(|| BlobError::BlobNotFound {
                    container: location.container_name.clone(),
                    blob: location.blob_name.clone(),
                })
        }
    }

    fn item(blob: &str) -> ExtractionItem {
        ExtractionItem::from_location(StorageConfig::new("memory://test", "docs", blob))
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let source = Arc::new(FakeSource::with(&[
            ("a.md", b"# A"),
            ("b.md", b"# B"),
            ("d.md", b"# D"),
            ("e.md", b"# E"),
        ]));
        let pipeline = ExtractionPipeline::new(source, ExtractorRegistry::default());

        let items = vec![item("a.md"), item("b.md"), item("missing.md"), item("d.md"), item("e.md")];
        let results = pipeline.process_all(items, 2).await;

        assert_eq!(results.len(), 5);
        for (i, result) in results.iter().enumerate() {
            if i == 2 {
                assert_eq!(result.error_kind(), Some(ErrorKind::BlobNotFound));
            } else {
                assert!(result.is_done(), "item {i} should succeed");
            }
        }
        let texts: Vec<_> = results.iter().filter_map(|r| r.text()).collect();
        assert_eq!(texts, vec!["A", "B", "D", "E"]);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_limit() {
        let names: Vec<String> = (0..10).map(|i| format!("doc{i}.md")).collect();
        let blobs: Vec<(&str, &[u8])> = names.iter().map(|n| (n.as_str(), &b"text"[..])).collect();
        let source = Arc::new(FakeSource::with(&blobs));
        let pipeline = ExtractionPipeline::new(source.clone(), ExtractorRegistry::default());

        let results = pipeline
            .process_all(names.iter().map(|n| item(n)).collect(), 3)
            .await;

        assert!(results.iter().all(|r| r.is_done()));
        let peak = source.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {peak}");
        assert!(peak >= 2, "items should overlap, peak was {peak}");
    }

    #[tokio::test]
    async fn finished_items_do_not_count_as_in_flight() {
        let source = FakeSource::with(&[
            ("slow.md", b"# Slow"),
            ("b.md", b"# B"),
            ("c.md", b"# C"),
            ("d.md", b"# D"),
            ("e.md", b"# E"),
        ])
        .with_delay("slow.md", Duration::from_millis(500));
        let pipeline = Arc::new(ExtractionPipeline::new(Arc::new(source), ExtractorRegistry::default()));
        let progress = BatchProgress::new(5);

        let batch = {
            let pipeline = pipeline.clone();
            let progress = progress.clone();
            let items = vec![item("slow.md"), item("b.md"), item("c.md"), item("d.md"), item("e.md")];
            tokio::spawn(async move { pipeline.process_all_tracked(items, 2, &progress).await })
        };

        // The slow item is still downloading; the others have finished.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let snapshot = progress.items();
        let in_flight = snapshot
            .iter()
            .filter(|s| matches!(s, ItemState::Downloading | ItemState::Extracting))
            .count();
        assert!(in_flight <= 2, "in flight: {in_flight}, states: {snapshot:?}");
        assert_eq!(snapshot[0], ItemState::Downloading);
        assert!(snapshot[1..].iter().all(|s| *s == ItemState::Done), "{snapshot:?}");
        assert_eq!(progress.state(), PipelineState::Running);

        let results = batch.await.unwrap();
        assert!(results.iter().all(|r| r.is_done()));
        assert_eq!(progress.state(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn unsupported_format_fails_without_download() {
        let source = Arc::new(FakeSource::with(&[("photo.png", b"png"), ("ok.md", b"fine")]));
        let pipeline = ExtractionPipeline::new(source.clone(), ExtractorRegistry::default());

        let progress = BatchProgress::new(2);
        let results = pipeline
            .process_all_tracked(vec![item("photo.png"), item("ok.md")], 5, &progress)
            .await;

        assert_eq!(results[0].error_kind(), Some(ErrorKind::UnsupportedFormat));
        assert_eq!(results[0].format, DocumentFormat::Unrecognized(".png".into()));
        assert!(results[1].is_done());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        assert_eq!(progress.items(), vec![ItemState::Failed, ItemState::Done]);
        assert_eq!(progress.state(), PipelineState::Completed);
        assert_eq!(progress.finished_count(), 2);
    }

    #[tokio::test]
    async fn extraction_errors_are_captured() {
        let source = Arc::new(FakeSource::with(&[("bad.pdf", b"not a pdf")]));
        let pipeline = ExtractionPipeline::new(source, ExtractorRegistry::default());

        let results = pipeline.process_all(vec![item("bad.pdf")], 1).await;
        assert_eq!(results[0].error_kind(), Some(ErrorKind::ExtractionFailed));
        assert_eq!(results[0].source_reference, "memory://test/docs/bad.pdf");
    }

    #[tokio::test]
    async fn malformed_pdf_fails_alone() {
        let good = crate::fixtures::pdf_fixture("Hello PDF");
        let bad = crate::fixtures::pdf_without_media_box("Hello PDF");
        let source = Arc::new(FakeSource::with(&[
            ("a.md", &b"# A"[..]),
            ("bad.pdf", bad.as_slice()),
            ("good.pdf", good.as_slice()),
            ("c.md", &b"# C"[..]),
        ]));
        let pipeline = ExtractionPipeline::new(source, ExtractorRegistry::default());

        let items = vec![item("a.md"), item("bad.pdf"), item("good.pdf"), item("c.md")];
        let results = pipeline.process_all(items, 2).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].text(), Some("A"));
        assert_eq!(results[1].error_kind(), Some(ErrorKind::ExtractionFailed));
        assert_eq!(results[2].text().map(str::trim), Some("Hello PDF"));
        assert_eq!(results[3].text(), Some("C"));
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let pipeline = ExtractionPipeline::new(Arc::new(FakeSource::default()), ExtractorRegistry::default());
        let progress = BatchProgress::new(0);
        assert_eq!(progress.state(), PipelineState::Completed);
        assert!(pipeline.process_all_tracked(vec![], 5, &progress).await.is_empty());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let progress = BatchProgress::new(1);
        progress.advance(0, ItemState::Failed);
        progress.advance(0, ItemState::Downloading);
        assert_eq!(progress.items(), vec![ItemState::Failed]);
    }
}
