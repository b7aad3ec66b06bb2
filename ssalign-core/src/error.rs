//! Error type shared by the corpus readers, option validation and the parallel barrier.

use thiserror::Error;

pub type AlignResult<T> = Result<T, AlignError>;

#[derive(Error, Debug)]
pub enum AlignError {
    /// Malformed input line
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// Source and target sides do not hold the same number of sentences
    #[error("sentence count mismatch: source has {source_len}, target has {target_len}")]
    LengthMismatch { source_len: usize, target_len: usize },

    /// Sentence length cut-off would let target positions collide with `NULL_LINK`
    #[error("maximum sentence length {max_len} exceeds {limit}")]
    SentenceLimit { max_len: usize, limit: usize },

    #[error("interpolation weight {0} is outside [0, 1]")]
    InvalidLambda(f64),

    #[error("model must be 1, 2 or 3, got {0}")]
    InvalidModel(u8),

    /// Requested annotation column is missing on a line
    #[error("line {line}: no column {column}")]
    InvalidColumn { line: usize, column: usize },

    /// An expectation worker died before reporting its counts
    #[error("expectation worker for chunk {chunk} panicked")]
    WorkerPanicked { chunk: usize },

    #[error("could not start expectation workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
