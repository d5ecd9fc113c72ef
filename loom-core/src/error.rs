//! Error types for the engine

use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum LoomError {
    /// A rule name was not found among the compiled rules
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// A pattern was malformed (e.g. referenced a node outside the rule)
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),

    /// An operation required a clean buffer but found pending changes
    #[error("store is not clean: buffer has {0} pending change(s)")]
    DirtyBuffer(usize),

    /// A rollback target was out of range for the current path length
    #[error("invalid rollback target: {0}")]
    InvalidRollback(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, LoomError>;
