//! End-to-end pipeline: reconcile → embed issue → rank → select.

use std::path::Path;
use std::sync::Arc;

use scout_index::truncate::truncate_chars;
use scout_index::{IndexStore, PassReport, Reconciler, SimilaritySearch};
use scout_llm::{ChatProvider, EmbeddingProvider, RetryPolicy, call_with_retry};

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::selector::{Candidate, Selector};

/// The file chosen for an issue, with the evidence behind the choice.
#[derive(Debug, Clone)]
pub struct RelevantFile {
    pub path: String,
    pub content: String,
    /// Ranked candidates offered to the selector, nearest first.
    pub candidates: Vec<Candidate>,
    pub pass: PassReport,
}

pub struct RelevanceEngine<E, C> {
    embedder: Arc<E>,
    reconciler: Reconciler<E>,
    search: SimilaritySearch,
    selector: Selector<C>,
    retry: RetryPolicy,
    max_candidates: usize,
    max_query_chars: usize,
}

impl<E: EmbeddingProvider, C: ChatProvider> RelevanceEngine<E, C> {
    #[must_use]
    pub fn new(embedder: Arc<E>, chat: Arc<C>, config: &Config) -> Self {
        Self {
            reconciler: Reconciler::new(Arc::clone(&embedder), config.reconciler_config()),
            embedder,
            search: SimilaritySearch::new(config.retrieval.metric),
            selector: Selector::new(chat),
            retry: config.retry_policy(),
            max_candidates: config.retrieval.max_candidates,
            max_query_chars: config.retrieval.max_query_chars,
        }
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Selector<C>) -> Self {
        self.selector = selector;
        self
    }

    /// Bring `store` in line with the repository at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot read the store or commit its changes.
    pub async fn reconcile(&self, store: &IndexStore, root: &Path) -> Result<PassReport> {
        let pass = self.reconciler.reconcile(store, root).await?;
        let updated = pass.updated_count();
        if updated > 0 {
            tracing::info!(updated, "updated embeddings for modified files");
        }
        Ok(pass)
    }

    /// Embed `issue` and return up to `k` stored files nearest to it.
    ///
    /// Distances and contents come from one store snapshot. An empty store
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the store read fails.
    pub async fn rank(&self, store: &IndexStore, issue: &str, k: usize) -> Result<Vec<Candidate>> {
        let query_text = truncate_chars(issue, self.max_query_chars);
        let query = call_with_retry("issue embedding", &self.retry, || {
            self.embedder.embed(query_text)
        })
        .await?;

        let ranked = self.search.nearest(store, &query, k).await?;
        for file in &ranked {
            tracing::info!(
                path = %file.path,
                relevance = format_args!("{:.3}", file.distance),
                "candidate"
            );
        }
        Ok(ranked
            .into_iter()
            .map(|file| Candidate {
                path: file.path,
                content: file.content,
                distance: file.distance,
            })
            .collect())
    }

    /// Reconcile, rank and let the selector pick exactly one file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoRelevantFile`] when the index is empty,
    /// [`CoreError::SelectionIntegrity`] when the selector answers with a
    /// path that was not offered, or any index or provider error.
    pub async fn find_relevant_file(
        &self,
        store: &IndexStore,
        root: &Path,
        issue: &str,
    ) -> Result<RelevantFile> {
        let pass = self.reconcile(store, root).await?;
        let candidates = self.rank(store, issue, self.max_candidates).await?;
        if candidates.is_empty() {
            return Err(CoreError::NoRelevantFile);
        }

        let path = self.selector.select(issue, &candidates).await?;
        let content = candidates
            .iter()
            .find(|c| c.path == path)
            .map(|c| c.content.clone())
            .ok_or_else(|| CoreError::SelectionIntegrity {
                returned: path.clone(),
                candidates: candidates.len(),
            })?;
        tracing::info!(path = %path, "selected most relevant file");

        Ok(RelevantFile {
            path,
            content,
            candidates,
            pass,
        })
    }
}
