//! Incremental file index and nearest-neighbor retrieval.
//!
//! A [`reconciler::Reconciler`] walks a repository, fingerprints each source
//! file and embeds only new or changed content into an `SQLite`-backed
//! [`store::IndexStore`]. [`search::SimilaritySearch`] ranks the stored
//! vectors against a query embedding.

pub mod error;
pub mod hash;
pub mod reconciler;
pub mod scanner;
pub mod search;
pub mod store;
pub mod truncate;

pub use error::{IndexError, Result};
pub use reconciler::{FileOutcome, PassReport, Reconciler, ReconcilerConfig};
pub use scanner::{FileScanner, ScanItem, ScanSkip, ScannedFile, ScannerConfig};
pub use search::{DistanceMetric, RankedFile, SearchHit, SimilaritySearch};
pub use store::{IndexMeta, IndexSnapshot, IndexStore, IndexedFile, PassChanges};
