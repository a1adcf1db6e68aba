//! Turns resolved candidates into prepared documents, concurrently.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use common::{
    error::AppError,
    storage::{
        store::DocumentStore,
        types::{
            candidate_file::CandidateFile,
            prepared_document::{DocumentBody, PreparedDocument},
        },
    },
};

use crate::cache::{CacheKey, PreparedCache};
use crate::progress::{FetchProgress, ProgressSender};

/// Uploads document bytes to the LLM's native file API and returns a handle
/// once the remote processing state is terminal.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, data: Bytes, display_name: &str) -> Result<String, AppError>;
}

/// How fetched bytes become a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    /// Decode bytes as UTF-8 text for direct prompt embedding.
    Download,
    /// Push bytes through the LLM file API and keep only the handle.
    Upload,
}

/// Attempted-vs-succeeded diagnostics for one fetch batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub attempted: usize,
    pub prepared: usize,
}

/// Bounded-concurrency fetch/prepare pipeline.
///
/// Completion order across workers is non-deterministic, so the output
/// order carries no meaning; callers that need stable ordering sort the
/// prepared set themselves.
pub struct FetchPipeline {
    store: DocumentStore,
    cache: Arc<PreparedCache>,
    max_concurrent: usize,
    mode: PrepareMode,
    uploader: Option<Arc<dyn FileUploader>>,
    scratch_dir: Option<PathBuf>,
}

impl FetchPipeline {
    /// Download pipeline: prepared documents carry decoded text.
    pub fn downloader(store: DocumentStore, cache: Arc<PreparedCache>, max_concurrent: usize) -> Self {
        Self {
            store,
            cache,
            max_concurrent: max_concurrent.max(1),
            mode: PrepareMode::Download,
            uploader: None,
            scratch_dir: None,
        }
    }

    /// Upload pipeline: prepared documents carry file handles minted by
    /// `uploader`.
    pub fn uploader(
        store: DocumentStore,
        cache: Arc<PreparedCache>,
        max_concurrent: usize,
        uploader: Arc<dyn FileUploader>,
    ) -> Self {
        Self {
            store,
            cache,
            max_concurrent: max_concurrent.max(1),
            mode: PrepareMode::Upload,
            uploader: Some(uploader),
            scratch_dir: None,
        }
    }

    /// Mirror downloaded text into `dir`, cleared at the start of every
    /// batch so stale temp files never leak across requests.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Fetches every candidate concurrently and returns the prepared set.
    ///
    /// Individual failures are logged and dropped; only the degenerate case
    /// where every candidate failed surfaces as `NoUsableDocuments`.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn prepare_all(
        &self,
        candidates: &[CandidateFile],
        progress: Option<ProgressSender>,
    ) -> Result<(Vec<PreparedDocument>, FetchReport), AppError> {
        let total = candidates.len();
        if total == 0 {
            return Ok((
                Vec::new(),
                FetchReport {
                    attempted: 0,
                    prepared: 0,
                },
            ));
        }

        self.reset_scratch_dir().await?;

        let started = Instant::now();
        let completed = Arc::new(AtomicUsize::new(0));

        let outcomes: Vec<Result<PreparedDocument, AppError>> =
            futures::stream::iter(candidates.iter().cloned())
                .map(|candidate| {
                    let completed = Arc::clone(&completed);
                    let progress = progress.clone();
                    async move {
                        let outcome = self.prepare_one(candidate).await;
                        let done = completed.fetch_add(1, Ordering::SeqCst).saturating_add(1);
                        if let Some(tx) = &progress {
                            let _ = tx.send(FetchProgress {
                                completed: done,
                                total,
                                elapsed: started.elapsed(),
                            });
                        }
                        outcome
                    }
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;

        let mut prepared = Vec::with_capacity(total);
        for outcome in outcomes {
            match outcome {
                Ok(document) => prepared.push(document),
                Err(err) => warn!(error = %err, "dropping document after failed fetch"),
            }
        }

        if prepared.is_empty() {
            return Err(AppError::NoUsableDocuments(format!(
                "all {total} candidate fetches failed"
            )));
        }

        let report = FetchReport {
            attempted: total,
            prepared: prepared.len(),
        };
        debug!(attempted = report.attempted, prepared = report.prepared, "fetch batch done");
        Ok((prepared, report))
    }

    async fn prepare_one(&self, candidate: CandidateFile) -> Result<PreparedDocument, AppError> {
        let key = CacheKey {
            location: candidate.location.clone(),
            last_modified: candidate.last_modified,
        };

        if let Some(body) = self.cache.get(&key).await {
            debug!(location = %candidate.location, "prepared-document cache hit");
            return Ok(PreparedDocument { candidate, body });
        }

        let bytes = self
            .store
            .get(&candidate.location)
            .await
            .map_err(|err| AppError::Fetch {
                location: candidate.location.clone(),
                reason: err.to_string(),
            })?;

        let body = match self.mode {
            PrepareMode::Download => {
                let text =
                    String::from_utf8(bytes.to_vec()).map_err(|err| AppError::Fetch {
                        location: candidate.location.clone(),
                        reason: format!("invalid UTF-8: {err}"),
                    })?;
                self.mirror_to_scratch(&candidate.name, &text).await;
                DocumentBody::Text(text)
            }
            PrepareMode::Upload => {
                let uploader = self.uploader.as_ref().ok_or_else(|| {
                    AppError::Validation("upload mode requires a file uploader".to_string())
                })?;
                let file_id = uploader.upload(bytes, &candidate.name).await?;
                DocumentBody::Handle { file_id }
            }
        };

        self.cache.insert(key, body.clone()).await;
        Ok(PreparedDocument { candidate, body })
    }

    async fn reset_scratch_dir(&self) -> Result<(), AppError> {
        let Some(dir) = &self.scratch_dir else {
            return Ok(());
        };
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    /// Best-effort; the scratch mirror is a debugging aid, not a data path.
    async fn mirror_to_scratch(&self, name: &str, text: &str) {
        let Some(dir) = &self.scratch_dir else {
            return;
        };
        if let Err(err) = tokio::fs::write(dir.join(name), text).await {
            debug!(file = %name, error = %err, "failed to mirror document to scratch dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::storage::store::testing::seeded_store;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn candidate(location: &str) -> CandidateFile {
        let (province, name) = location.split_once('/').unwrap_or(("", location));
        CandidateFile {
            location: location.to_string(),
            name: name.to_string(),
            province: province.to_string(),
            last_modified: Utc::now(),
        }
    }

    fn download_pipeline(store: DocumentStore) -> FetchPipeline {
        let cache = Arc::new(PreparedCache::new(Some(Duration::from_secs(3600))));
        FetchPipeline::downloader(store, cache, 4)
    }

    #[tokio::test]
    async fn test_prepare_all_fetches_every_candidate() {
        let store = seeded_store(&[("Tak", &["summary.txt"]), ("Nan", &["summary.txt"])]).await;
        let pipeline = download_pipeline(store);
        let candidates = vec![candidate("Tak/summary.txt"), candidate("Nan/summary.txt")];

        let (prepared, report) = pipeline
            .prepare_all(&candidates, None)
            .await
            .expect("prepare");

        assert_eq!(report, FetchReport { attempted: 2, prepared: 2 });
        assert_eq!(prepared.len(), 2);
        assert!(prepared.iter().all(|doc| matches!(
            &doc.body,
            DocumentBody::Text(text) if text.starts_with("data for")
        )));
    }

    #[tokio::test]
    async fn test_partial_failure_drops_only_failed_candidates() {
        let store = seeded_store(&[("Tak", &["summary.txt"])]).await;
        let pipeline = download_pipeline(store);
        let candidates = vec![
            candidate("Tak/summary.txt"),
            candidate("Nan/missing.txt"),
            candidate("Chiangrai/missing.txt"),
        ];

        let (prepared, report) = pipeline
            .prepare_all(&candidates, None)
            .await
            .expect("prepare");

        assert_eq!(report, FetchReport { attempted: 3, prepared: 1 });
        assert_eq!(prepared[0].candidate.location, "Tak/summary.txt");
    }

    #[tokio::test]
    async fn test_total_failure_signals_no_usable_documents() {
        let store = seeded_store(&[]).await;
        let pipeline = download_pipeline(store);
        let candidates = vec![candidate("Tak/missing.txt"), candidate("Nan/missing.txt")];

        let result = pipeline.prepare_all(&candidates, None).await;

        assert!(matches!(result, Err(AppError::NoUsableDocuments(_))));
    }

    #[tokio::test]
    async fn test_empty_input_is_not_a_failure() {
        let store = seeded_store(&[]).await;
        let pipeline = download_pipeline(store);

        let (prepared, report) = pipeline.prepare_all(&[], None).await.expect("prepare");

        assert!(prepared.is_empty());
        assert_eq!(report, FetchReport { attempted: 0, prepared: 0 });
    }

    #[tokio::test]
    async fn test_progress_reported_per_candidate() {
        let store = seeded_store(&[("Tak", &["a.txt", "b.txt", "c.txt"])]).await;
        let pipeline = download_pipeline(store);
        let candidates = vec![
            candidate("Tak/a.txt"),
            candidate("Tak/b.txt"),
            candidate("Tak/c.txt"),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        pipeline
            .prepare_all(&candidates, Some(tx))
            .await
            .expect("prepare");

        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }

        assert_eq!(updates.len(), 3);
        assert!(updates.iter().all(|u| u.total == 3));
        let mut counts: Vec<usize> = updates.iter().map(|u| u.completed).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_store_access() {
        let store = seeded_store(&[]).await; // store is empty on purpose
        let cache = Arc::new(PreparedCache::new(None));
        let candidate = candidate("Tak/summary.txt");
        cache
            .insert(
                CacheKey {
                    location: candidate.location.clone(),
                    last_modified: candidate.last_modified,
                },
                DocumentBody::Text("cached body".into()),
            )
            .await;
        let pipeline = FetchPipeline::downloader(store, cache, 4);

        let (prepared, _) = pipeline
            .prepare_all(&[candidate], None)
            .await
            .expect("prepare must be served from cache");

        assert_eq!(prepared[0].body, DocumentBody::Text("cached body".into()));
    }

    #[tokio::test]
    async fn test_scratch_dir_cleared_between_batches() {
        let store = seeded_store(&[("Tak", &["current.txt"])]).await;
        let scratch = tempfile::tempdir().expect("tempdir");
        let stale = scratch.path().join("stale.txt");
        tokio::fs::write(&stale, "left over").await.expect("seed stale file");

        let pipeline = download_pipeline(store).with_scratch_dir(scratch.path());
        pipeline
            .prepare_all(&[candidate("Tak/current.txt")], None)
            .await
            .expect("prepare");

        assert!(!stale.exists(), "stale scratch file must be removed");
        assert!(scratch.path().join("current.txt").exists());
    }

    struct StubUploader;

    #[async_trait]
    impl FileUploader for StubUploader {
        async fn upload(&self, _data: Bytes, display_name: &str) -> Result<String, AppError> {
            Ok(format!("file-{display_name}"))
        }
    }

    #[tokio::test]
    async fn test_upload_mode_produces_handles() {
        let store = seeded_store(&[("Tak", &["summary.txt"])]).await;
        let cache = Arc::new(PreparedCache::new(None));
        let pipeline =
            FetchPipeline::uploader(store, cache, 4, Arc::new(StubUploader));

        let (prepared, _) = pipeline
            .prepare_all(&[candidate("Tak/summary.txt")], None)
            .await
            .expect("prepare");

        assert_eq!(
            prepared[0].body,
            DocumentBody::Handle {
                file_id: "file-summary.txt".into()
            }
        );
    }
}
