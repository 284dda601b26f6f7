//! Reconciliation pass: scan → diff → embed → commit.
//!
//! A pass walks the repository, compares each file's fingerprint with the
//! stored one and embeds only new or changed content. All mutations are
//! collected in memory and committed in one transaction at the end, so a
//! pass that is cancelled or fails before the commit leaves the previous
//! index untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::{StreamExt, stream};
use scout_llm::{EmbeddingProvider, LlmError, RetryPolicy, call_with_retry};

use crate::error::{IndexError, Result};
use crate::scanner::{FileScanner, ScanItem, ScanSkip, ScannedFile, ScannerConfig};
use crate::search::DistanceMetric;
use crate::store::{IndexMeta, IndexStore, IndexedFile, PassChanges};
use crate::truncate::{DEFAULT_MAX_EMBED_CHARS, truncate_chars};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub scanner: ScannerConfig,
    /// Characters of each file sent to the embedding provider.
    pub max_embed_chars: usize,
    /// Embedding calls in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Recorded in the index metadata alongside the embedding model.
    pub metric: DistanceMetric,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            max_embed_chars: DEFAULT_MAX_EMBED_CHARS,
            concurrency: 4,
            retry: RetryPolicy::default(),
            metric: DistanceMetric::default(),
        }
    }
}

/// What happened to one scanned file during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Embedded and upserted.
    Indexed,
    /// Fingerprint matched; no embedding call was made.
    Unchanged,
    Skipped(ScanSkip),
    /// Embedding failed; any previously stored row is kept.
    Failed(String),
}

/// Summary of a reconciliation pass.
#[derive(Debug, Default, Clone)]
pub struct PassReport {
    pub outcomes: BTreeMap<String, FileOutcome>,
    /// Stored paths deleted by this pass.
    pub removed: Vec<String>,
    /// Provider calls made, retries included.
    pub embed_calls: usize,
    pub model_changed: bool,
    pub duration_ms: u64,
}

impl PassReport {
    #[must_use]
    pub fn files_scanned(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Indexed))
    }

    #[must_use]
    pub fn unchanged_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Unchanged))
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped(_)))
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// Files whose stored state changed: re-embedded plus removed.
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.indexed_count() + self.removed.len()
    }

    /// Paths that failed to embed, with the error message.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(path, outcome)| match outcome {
            FileOutcome::Failed(reason) => Some((path.as_str(), reason.as_str())),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// Brings an [`IndexStore`] in line with a repository on disk.
pub struct Reconciler<P> {
    provider: Arc<P>,
    config: ReconcilerConfig,
}

impl<P: EmbeddingProvider> Reconciler<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: ReconcilerConfig) -> Self {
        Self { provider, config }
    }

    /// Run one reconciliation pass over `root`.
    ///
    /// Per-file embedding failures are recorded in the report and never
    /// abort the pass. A pass with nothing to change performs no write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read, the walk task panics,
    /// or the final commit fails ([`IndexError::StoreWrite`]).
    pub async fn reconcile(&self, store: &IndexStore, root: &Path) -> Result<PassReport> {
        let start = Instant::now();
        let mut report = PassReport::default();

        let stored = store.fingerprints().await?;
        let meta = store.meta().await?;
        let model = self.provider.embedding_model().to_owned();
        report.model_changed = meta.as_ref().is_some_and(|m| m.embedding_model != model);
        if report.model_changed {
            tracing::warn!(
                previous = meta.as_ref().map_or("", |m| m.embedding_model.as_str()),
                current = %model,
                "embedding model changed, re-embedding every file"
            );
        }

        let scanner = FileScanner::new(root, self.config.scanner.clone());
        let items = tokio::task::spawn_blocking(move || scanner.scan().collect::<Vec<_>>())
            .await
            .map_err(|e| IndexError::Other(format!("scan task failed: {e}")))?;

        let mut scanned: HashSet<String> = HashSet::with_capacity(items.len());
        let mut pending: Vec<ScannedFile> = Vec::new();
        for item in items {
            match item {
                ScanItem::Skipped { path, reason } => {
                    tracing::debug!(path = %path, %reason, "file skipped");
                    report.outcomes.insert(path, FileOutcome::Skipped(reason));
                }
                ScanItem::File(file)
                    if truncate_chars(&file.content, self.config.max_embed_chars)
                        .trim()
                        .is_empty() =>
                {
                    tracing::debug!(path = %file.path, "file skipped: no text to embed");
                    report
                        .outcomes
                        .insert(file.path, FileOutcome::Skipped(ScanSkip::Empty));
                }
                ScanItem::File(file) => {
                    scanned.insert(file.path.clone());
                    let unchanged = !report.model_changed
                        && stored.get(&file.path) == Some(&file.fingerprint);
                    if unchanged {
                        report.outcomes.insert(file.path, FileOutcome::Unchanged);
                    } else {
                        pending.push(file);
                    }
                }
            }
        }

        let total = pending.len();
        tracing::info!(
            scanned = scanned.len(),
            to_embed = total,
            stored = stored.len(),
            "reconciliation started"
        );

        let calls = AtomicUsize::new(0);
        let mut embedded = self.embed_all(pending, &calls).await;
        embedded.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        report.embed_calls = calls.into_inner();

        let expected_dim = match &meta {
            Some(m) if !report.model_changed => Some(m.dimension),
            _ => embedded
                .iter()
                .find_map(|(_, r)| r.as_ref().ok().map(Vec::len)),
        };

        let mut changes = PassChanges::default();
        for (file, result) in embedded {
            let result = result.map_err(IndexError::from).and_then(|embedding| {
                match expected_dim {
                    Some(expected) if expected != embedding.len() => {
                        Err(IndexError::DimensionMismatch {
                            expected,
                            actual: embedding.len(),
                        })
                    }
                    _ => Ok(embedding),
                }
            });
            match result {
                Ok(embedding) => {
                    tracing::debug!(path = %file.path, fingerprint = %file.fingerprint, "embedded");
                    report.outcomes.insert(file.path.clone(), FileOutcome::Indexed);
                    changes.upserts.push(IndexedFile {
                        path: file.path,
                        fingerprint: file.fingerprint,
                        content: file.content,
                        embedding,
                    });
                }
                Err(e) => {
                    // A stale vector from another model must not survive a model change.
                    if report.model_changed && stored.contains_key(&file.path) {
                        changes.deletes.insert(file.path.clone());
                    }
                    report
                        .outcomes
                        .insert(file.path, FileOutcome::Failed(e.to_string()));
                }
            }
        }

        let removed: BTreeSet<String> = stored
            .keys()
            .filter(|path| !scanned.contains(*path))
            .cloned()
            .collect();
        changes.deletes.extend(removed);
        report.removed = changes.deletes.iter().cloned().collect();

        if let Some(dimension) = expected_dim {
            let next = IndexMeta {
                embedding_model: model,
                dimension,
                metric: self.config.metric,
            };
            let wrote_vectors = !changes.upserts.is_empty();
            if meta.as_ref() != Some(&next) && (wrote_vectors || meta.is_some()) {
                changes.meta = Some(next);
            }
        }

        let failed = report.failed_count();
        if failed > 0 {
            let sample: Vec<_> = report.failures().take(3).map(|(p, _)| p).collect();
            tracing::warn!(
                failed,
                sample = ?sample,
                "embedding failed for some files; previous index entries kept"
            );
        }

        if changes.is_empty() {
            tracing::debug!("index already up to date, nothing to commit");
        } else {
            store.commit_pass(&changes).await?;
        }

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            scanned = report.files_scanned(),
            indexed = report.indexed_count(),
            unchanged = report.unchanged_count(),
            skipped = report.skipped_count(),
            failed,
            removed = report.removed.len(),
            embed_calls = report.embed_calls,
            duration_ms = report.duration_ms,
            "reconciliation complete"
        );
        Ok(report)
    }

    async fn embed_all(
        &self,
        files: Vec<ScannedFile>,
        calls: &AtomicUsize,
    ) -> Vec<(ScannedFile, std::result::Result<Vec<f32>, LlmError>)> {
        let total = files.len();
        let done = AtomicUsize::new(0);
        let done = &done;

        stream::iter(files)
            .map(|file| async move {
                let result = {
                    let text = truncate_chars(&file.content, self.config.max_embed_chars);
                    call_with_retry(&file.path, &self.config.retry, || {
                        calls.fetch_add(1, Ordering::Relaxed);
                        self.provider.embed(text)
                    })
                    .await
                };
                let i = done.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(
                    path = %file.path,
                    progress = format_args!("{i}/{total}"),
                    ok = result.is_ok(),
                );
                (file, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }
}
