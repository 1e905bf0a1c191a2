//! Error types for loft-core.

use thiserror::Error;

/// Result type for loft-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A syntax error in feature script source.
///
/// Carries the 1-based line and column of the offending token so the
/// editor can map the error back onto the script buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Line of the offending token (1-based).
    pub line: usize,
    /// Column of the offending token (1-based).
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Errors that can occur in loft-core.
///
/// Cycles in the feature graph are intentionally not represented here:
/// analysis still succeeds and reports the cyclic features through
/// [`crate::AnalysisResult`], so the host can surface a warning while the
/// engine keeps producing a (degraded) execution order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Source does not conform to the feature script grammar.
    ///
    /// Analysis aborts and the engine keeps its previous graph and cache.
    #[error(transparent)]
    Parse(#[from] ParseError),
}
