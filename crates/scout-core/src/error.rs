use scout_index::IndexError;
use scout_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Retrieval produced no candidates while a result was required.
    #[error("no relevant file found for the given issue description")]
    NoRelevantFile,

    /// The selector answered with a path outside the candidate set.
    #[error("selector returned {returned:?}, which is not one of the {candidates} candidates")]
    SelectionIntegrity { returned: String, candidates: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
