//! Unified error types for root-caller searches.

use thiserror::Error;

/// All errors that can end (or be logged during) a root-caller search.
///
/// Only `InvalidTarget`, `ProviderUnavailable` and `Unexpected` end a query as a
/// failure. `SearchFailure`, `ResolutionFailure` and `ArgumentExtraction` are local
/// to one method or one reference and are logged and absorbed by the traversal.
/// `Cancelled` is an outcome, not a failure: the finder turns it into
/// [`crate::finder::SearchOutcome::Cancelled`].
#[derive(Error, Debug)]
pub enum FinderError {
    /// The initial method does not resolve or no longer exists
    #[error("Invalid target method '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// The reference provider failed for one method's query
    #[error("Reference search failed for {method}: {message}")]
    SearchFailure { method: String, message: String },

    /// The enclosing method of a reference could not be determined
    #[error("Could not resolve the enclosing method of a reference in {file} at offset {offset}")]
    ResolutionFailure { file: String, offset: usize },

    /// Parsing or locating a call expression failed
    #[error("Argument extraction failed in {caller}: {reason}")]
    ArgumentExtraction { caller: String, reason: String },

    /// The reference provider cannot answer any query
    #[error("Reference provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Cooperative cancellation was observed
    #[error("Search cancelled")]
    Cancelled,

    /// Any other failure during the traversal (including a worker panic)
    #[error("Unexpected failure: {0}")]
    Unexpected(String),

    /// I/O error (source read, export write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration file or value
    #[error("Invalid configuration {path}: {message}")]
    Config { path: String, message: String },

    /// Invalid library path pattern
    #[error("Invalid library pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors reported by a [`crate::finder::ReferenceProvider`].
///
/// Never crosses the finder boundary: it is mapped to `FinderError::SearchFailure`
/// (one method skipped) or `FinderError::ProviderUnavailable` (query aborted).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The query for one method failed; other methods may still be searchable
    #[error("{0}")]
    Query(String),

    /// The provider cannot serve any query
    #[error("{0}")]
    Unavailable(String),
}
