//! `SQLite`-backed persistence for indexed files.
//!
//! One row per file path holding its fingerprint, full content and embedding.
//! Readers always observe the state of the last committed pass: every
//! mutation of a reconciliation pass lands in a single transaction and the
//! database runs in WAL mode.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteExecutor, SqlitePool};

use crate::error::{IndexError, Result};
use crate::search::DistanceMetric;

/// A stored file record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFile {
    pub path: String,
    pub fingerprint: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Embedding space every stored vector belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
}

/// Consistent view of the index at one point in time.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub meta: Option<IndexMeta>,
    /// Ordered by path.
    pub files: Vec<IndexedFile>,
}

/// All mutations produced by one reconciliation pass.
#[derive(Debug, Default)]
pub struct PassChanges {
    pub upserts: Vec<IndexedFile>,
    pub deletes: BTreeSet<String>,
    pub meta: Option<IndexMeta>,
}

impl PassChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty() && self.meta.is_none()
    }
}

type FileRow = (String, String, String, Vec<u8>);

#[derive(Debug, Clone)]
pub struct IndexStore {
    pool: SqlitePool,
}

impl IndexStore {
    /// Open (or create) the index database and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub async fn open(path: &str) -> Result<Self> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a single record atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert(&self, file: &IndexedFile) -> Result<()> {
        upsert_row(&self.pool, file)
            .await
            .map_err(IndexError::StoreWrite)
    }

    /// Remove records by path. Missing paths are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; no record is removed in that case.
    pub async fn delete<'a, I>(&self, paths: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tx = self.pool.begin().await.map_err(IndexError::StoreWrite)?;
        let mut removed = 0;
        for path in paths {
            removed += delete_row(&mut *tx, path)
                .await
                .map_err(IndexError::StoreWrite)?;
        }
        tx.commit().await.map_err(IndexError::StoreWrite)?;
        Ok(removed)
    }

    /// Apply every mutation of a pass in one transaction.
    ///
    /// Either all upserts, deletes and the meta update become visible, or
    /// none do.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StoreWrite`] if any statement or the commit fails.
    pub async fn commit_pass(&self, changes: &PassChanges) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(IndexError::StoreWrite)?;

        for path in &changes.deletes {
            delete_row(&mut *tx, path)
                .await
                .map_err(IndexError::StoreWrite)?;
        }
        for file in &changes.upserts {
            upsert_row(&mut *tx, file)
                .await
                .map_err(IndexError::StoreWrite)?;
        }
        if let Some(meta) = &changes.meta {
            let dimension = i64::try_from(meta.dimension)?;
            sqlx::query(
                "INSERT INTO index_meta (id, embedding_model, dimension, metric) VALUES (1, ?, ?, ?) \
                 ON CONFLICT(id) DO UPDATE SET embedding_model = excluded.embedding_model, \
                 dimension = excluded.dimension, metric = excluded.metric, \
                 updated_at = datetime('now')",
            )
            .bind(&meta.embedding_model)
            .bind(dimension)
            .bind(meta.metric.as_str())
            .execute(&mut *tx)
            .await
            .map_err(IndexError::StoreWrite)?;
        }

        tx.commit().await.map_err(IndexError::StoreWrite)?;
        tracing::debug!(
            upserts = changes.upserts.len(),
            deletes = changes.deletes.len(),
            meta = changes.meta.is_some(),
            "pass committed"
        );
        Ok(())
    }

    /// All records ordered by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored embedding is corrupt.
    pub async fn scan_all(&self) -> Result<Vec<IndexedFile>> {
        let rows: Vec<FileRow> = sqlx::query_as(
            "SELECT path, fingerprint, content, embedding FROM indexed_files ORDER BY path",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_file).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails or the stored embedding is corrupt.
    pub async fn get(&self, path: &str) -> Result<Option<IndexedFile>> {
        let row: Option<FileRow> = sqlx::query_as(
            "SELECT path, fingerprint, content, embedding FROM indexed_files WHERE path = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_file).transpose()
    }

    /// Path to fingerprint map of every stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fingerprints(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT path, fingerprint FROM indexed_files")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// Path and embedding of every record, ordered by path. Content is not loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored embedding is corrupt.
    pub async fn embeddings(&self) -> Result<Vec<(String, Vec<f32>)>> {
        let rows: Vec<(String, Vec<u8>)> =
            sqlx::query_as("SELECT path, embedding FROM indexed_files ORDER BY path")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(path, blob)| {
                let embedding = decode_embedding(&path, &blob)?;
                Ok((path, embedding))
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM indexed_files")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count)?)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Embedding space recorded by the last pass that embedded anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn meta(&self) -> Result<Option<IndexMeta>> {
        read_meta(&self.pool).await
    }

    /// Metadata and every record read inside one transaction.
    ///
    /// A pass committed while the snapshot is being read is either fully
    /// visible or not at all.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored embedding is corrupt.
    pub async fn snapshot(&self) -> Result<IndexSnapshot> {
        let mut tx = self.pool.begin().await?;
        let meta = read_meta(&mut *tx).await?;
        let rows: Vec<FileRow> = sqlx::query_as(
            "SELECT path, fingerprint, content, embedding FROM indexed_files ORDER BY path",
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let files = rows.into_iter().map(row_to_file).collect::<Result<_>>()?;
        Ok(IndexSnapshot { meta, files })
    }
}

async fn read_meta<'e, E: SqliteExecutor<'e>>(executor: E) -> Result<Option<IndexMeta>> {
    let row: Option<(String, i64, String)> =
        sqlx::query_as("SELECT embedding_model, dimension, metric FROM index_meta WHERE id = 1")
            .fetch_optional(executor)
            .await?;

    row.map(|(embedding_model, dimension, metric)| {
        Ok(IndexMeta {
            embedding_model,
            dimension: usize::try_from(dimension)?,
            metric: metric.parse()?,
        })
    })
    .transpose()
}

async fn upsert_row<'e, E: SqliteExecutor<'e>>(
    executor: E,
    file: &IndexedFile,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO indexed_files (path, fingerprint, content, embedding) VALUES (?, ?, ?, ?) \
         ON CONFLICT(path) DO UPDATE SET fingerprint = excluded.fingerprint, \
         content = excluded.content, embedding = excluded.embedding, \
         indexed_at = datetime('now')",
    )
    .bind(&file.path)
    .bind(&file.fingerprint)
    .bind(&file.content)
    .bind(encode_embedding(&file.embedding))
    .execute(executor)
    .await?;
    Ok(())
}

async fn delete_row<'e, E: SqliteExecutor<'e>>(
    executor: E,
    path: &str,
) -> std::result::Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM indexed_files WHERE path = ?")
        .bind(path)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

fn row_to_file((path, fingerprint, content, blob): FileRow) -> Result<IndexedFile> {
    let embedding = decode_embedding(&path, &blob)?;
    Ok(IndexedFile {
        path,
        fingerprint,
        content,
        embedding,
    })
}

/// Little-endian `f32` sequence.
pub(crate) fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub(crate) fn decode_embedding(path: &str, blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(IndexError::CorruptEmbedding {
            path: path.to_owned(),
        });
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn file(path: &str, fingerprint: &str, embedding: Vec<f32>) -> IndexedFile {
        IndexedFile {
            path: path.into(),
            fingerprint: fingerprint.into(),
            content: format!("content of {path}"),
            embedding,
        }
    }

    async fn memory_store() -> IndexStore {
        IndexStore::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let store = IndexStore::open(path).await.expect("open");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .expect("PRAGMA query");

        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips_record() {
        let store = memory_store().await;
        let record = file("src/a.py", "fp1", vec![0.5, -1.25, 3.0]);

        store.upsert(&record).await.unwrap();

        assert_eq!(store.get("src/a.py").await.unwrap(), Some(record));
        assert_eq!(store.get("missing.py").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = memory_store().await;
        store.upsert(&file("a.py", "fp1", vec![1.0])).await.unwrap();
        store.upsert(&file("a.py", "fp2", vec![2.0])).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        let stored = store.get("a.py").await.unwrap().unwrap();
        assert_eq!(stored.fingerprint, "fp2");
        assert_eq!(stored.embedding, vec![2.0]);
    }

    #[tokio::test]
    async fn delete_ignores_missing_paths() {
        let store = memory_store().await;
        store.upsert(&file("a.py", "fp", vec![1.0])).await.unwrap();

        let removed = store.delete(["a.py", "ghost.py"]).await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn scan_all_is_ordered_by_path() {
        let store = memory_store().await;
        for path in ["z.py", "a.py", "m/b.py"] {
            store.upsert(&file(path, "fp", vec![1.0])).await.unwrap();
        }

        let paths: Vec<_> = store
            .scan_all()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["a.py", "m/b.py", "z.py"]);
    }

    #[tokio::test]
    async fn commit_pass_applies_all_changes() {
        let store = memory_store().await;
        store.upsert(&file("old.py", "fp", vec![1.0, 0.0])).await.unwrap();

        let changes = PassChanges {
            upserts: vec![file("new.py", "fp", vec![0.0, 1.0])],
            deletes: BTreeSet::from(["old.py".to_string()]),
            meta: Some(IndexMeta {
                embedding_model: "mock-embed".into(),
                dimension: 2,
                metric: DistanceMetric::Cosine,
            }),
        };
        store.commit_pass(&changes).await.unwrap();

        assert_eq!(
            store.fingerprints().await.unwrap(),
            HashMap::from([("new.py".to_string(), "fp".to_string())])
        );
        assert_eq!(
            store.meta().await.unwrap(),
            Some(IndexMeta {
                embedding_model: "mock-embed".into(),
                dimension: 2,
                metric: DistanceMetric::Cosine,
            })
        );
    }

    #[tokio::test]
    async fn meta_is_overwritten_not_duplicated() {
        let store = memory_store().await;
        for (model, dimension, metric) in [
            ("a", 4, DistanceMetric::Cosine),
            ("b", 8, DistanceMetric::Euclidean),
        ] {
            let changes = PassChanges {
                meta: Some(IndexMeta {
                    embedding_model: model.into(),
                    dimension,
                    metric,
                }),
                ..PassChanges::default()
            };
            store.commit_pass(&changes).await.unwrap();
        }

        let meta = store.meta().await.unwrap().unwrap();
        assert_eq!(meta.embedding_model, "b");
        assert_eq!(meta.dimension, 8);
        assert_eq!(meta.metric, DistanceMetric::Euclidean);
    }

    #[tokio::test]
    async fn corrupt_blob_is_reported() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO indexed_files (path, fingerprint, content, embedding) VALUES ('x.py', 'fp', '', ?)",
        )
        .bind(vec![0u8, 1, 2])
        .execute(store.pool())
        .await
        .unwrap();

        let err = store.embeddings().await.unwrap_err();
        assert!(matches!(err, IndexError::CorruptEmbedding { path } if path == "x.py"));
    }

    #[tokio::test]
    async fn snapshot_ignores_uncommitted_pass() {
        let db = NamedTempFile::new().unwrap();
        let store = IndexStore::open(db.path().to_str().unwrap()).await.unwrap();
        let v1 = PassChanges {
            upserts: vec![file("a.py", "v1", vec![1.0, 0.0])],
            meta: Some(IndexMeta {
                embedding_model: "m1".into(),
                dimension: 2,
                metric: DistanceMetric::Cosine,
            }),
            ..PassChanges::default()
        };
        store.commit_pass(&v1).await.unwrap();

        let mut writer = store.pool().begin().await.unwrap();
        upsert_row(&mut *writer, &file("a.py", "v2", vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        sqlx::query("UPDATE index_meta SET embedding_model = 'm2', dimension = 3")
            .execute(&mut *writer)
            .await
            .unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.meta, v1.meta);
        assert_eq!(snapshot.files, v1.upserts);

        writer.commit().await.unwrap();
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.meta.unwrap().embedding_model, "m2");
        assert_eq!(snapshot.files[0].fingerprint, "v2");
        assert_eq!(snapshot.files[0].embedding.len(), 3);
    }

    #[test]
    fn embedding_encoding_is_little_endian_f32() {
        let bytes = encode_embedding(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding("p", &bytes).unwrap(), vec![1.0, -2.5]);
    }

    #[test]
    fn pass_changes_default_is_empty() {
        assert!(PassChanges::default().is_empty());
    }
}
