//! Configuration, candidate selection, and the issue-to-file relevance pipeline.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod relevance;
pub mod selector;

pub use error::{CoreError, Result};
pub use relevance::{RelevanceEngine, RelevantFile};
pub use selector::{Candidate, Selector};
