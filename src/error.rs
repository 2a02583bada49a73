use std::path::PathBuf;

/// Errors surfaced by the library.
///
/// Data-sparsity conditions (incomplete joins, empty windows) are not errors;
/// they degrade to smaller or empty result tables instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A discourseme name is already registered; the registry is unchanged.
    #[error("discourseme name `{0}` already taken; cannot register discourseme")]
    NameConflict(String),

    /// A span with `start > end`.
    #[error("invalid span: start {start} exceeds end {end}")]
    InvalidSpan { start: usize, end: usize },

    /// A mis-specified call: unknown ordering measure, window of size zero,
    /// an empty window set, mismatched layer lengths, and the like.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A malformed input row in a span table, token stream or frequency list.
    #[error("malformed row in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
