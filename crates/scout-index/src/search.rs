//! Exact nearest-neighbor search over stored embeddings.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::store::IndexStore;

/// Distance used to rank stored vectors against a query. Lower is closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`, in `[0, 2]`.
    #[default]
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }

    /// Distance between two equal-length vectors.
    ///
    /// A zero vector has cosine distance 1 to everything. NaN inputs yield NaN.
    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(IndexError::Other(format!("unknown distance metric: {other}"))),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub path: String,
    pub distance: f32,
}

/// A ranked stored file, read from the same snapshot as its distance.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFile {
    pub path: String,
    pub content: String,
    pub distance: f32,
}

/// Rank `rows` by distance to `query` and keep the closest `k`.
///
/// Ascending distance, ties broken by path, NaN distances last. Rows whose
/// dimension differs from the query are ignored.
#[must_use]
pub fn rank<I>(rows: I, query: &[f32], k: usize, metric: DistanceMetric) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (String, Vec<f32>)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = rows
        .into_iter()
        .filter_map(|(path, embedding)| {
            if embedding.len() != query.len() {
                tracing::warn!(
                    path = %path,
                    stored = embedding.len(),
                    query = query.len(),
                    "skipping stored vector with mismatched dimension"
                );
                return None;
            }
            let distance = metric.distance(query, &embedding);
            Some(SearchHit { path, distance })
        })
        .collect();

    if hits.len() > k {
        hits.select_nth_unstable_by(k - 1, compare_hits);
        hits.truncate(k);
    }
    hits.sort_by(compare_hits);
    hits
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    match (a.distance.is_nan(), b.distance.is_nan()) {
        (false, false) => a.distance.total_cmp(&b.distance),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
    .then_with(|| a.path.cmp(&b.path))
}

/// Query-time view over an [`IndexStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilaritySearch {
    metric: DistanceMetric,
}

impl SimilaritySearch {
    #[must_use]
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    /// Return up to `k` stored paths nearest to `query`.
    ///
    /// An empty store or `k == 0` yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if `query` does not match the
    /// dimension recorded for the index, or a store error.
    pub async fn search(
        &self,
        store: &IndexStore,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        Ok(self
            .nearest(store, query, k)
            .await?
            .into_iter()
            .map(|f| SearchHit {
                path: f.path,
                distance: f.distance,
            })
            .collect())
    }

    /// Like [`Self::search`], but each hit carries the content stored with
    /// the ranked vector.
    ///
    /// # Errors
    ///
    /// Same as [`Self::search`].
    pub async fn nearest(
        &self,
        store: &IndexStore,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RankedFile>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let snapshot = store.snapshot().await?;
        if let Some(meta) = &snapshot.meta
            && meta.dimension != query.len()
        {
            return Err(IndexError::DimensionMismatch {
                expected: meta.dimension,
                actual: query.len(),
            });
        }

        let mut contents = HashMap::with_capacity(snapshot.files.len());
        let rows: Vec<(String, Vec<f32>)> = snapshot
            .files
            .into_iter()
            .map(|f| {
                contents.insert(f.path.clone(), f.content);
                (f.path, f.embedding)
            })
            .collect();

        let hits = rank(rows, query, k, self.metric);
        tracing::debug!(k, returned = hits.len(), metric = %self.metric, "similarity search");
        Ok(hits
            .into_iter()
            .map(|hit| RankedFile {
                content: contents.remove(&hit.path).unwrap_or_default(),
                path: hit.path,
                distance: hit.distance,
            })
            .collect())
    }
}
