//! Error types for pattern parsing.

use thiserror::Error;

/// Errors raised while parsing route patterns or verb names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A `:` capture segment without a name.
    #[error("pattern '{pattern}' has a capture segment without a name")]
    EmptyCapture {
        /// The offending pattern.
        pattern: String,
    },

    /// A capture name that appears twice in one pattern.
    #[error("pattern '{pattern}' captures '{name}' more than once")]
    DuplicateCapture {
        /// The offending pattern.
        pattern: String,
        /// The repeated capture name.
        name: String,
    },

    /// An HTTP verb that is not recognised.
    #[error("unknown request verb '{0}'")]
    UnknownVerb(String),
}

/// Result type for pattern operations.
pub type PatternResult<T> = Result<T, PatternError>;
