//! Error types for the hazard engine
//!
//! ## Table of Contents
//! - **HazardError**: Main error enum covering all failure modes
//! - **Result**: Type alias for `Result<T, HazardError>`

use thiserror::Error;

/// Result type alias for hazard engine operations
pub type Result<T> = std::result::Result<T, HazardError>;

/// Main error type for hazard engine operations
#[derive(Error, Debug)]
pub enum HazardError {
    /// Invalid calculation configuration (duplicate source ids, bad concurrency, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// A source violates a container invariant (wrong region type, bad geometry)
    #[error("source error: {0}")]
    Source(String),

    /// Logic-tree construction or reduction failure
    #[error("logic tree error: {0}")]
    LogicTree(String),

    /// A dispatched block computation failed inside a worker
    #[error("worker error: {0}")]
    Worker(String),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (should not occur in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl HazardError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a logic-tree error
    pub fn logic_tree(msg: impl Into<String>) -> Self {
        Self::LogicTree(msg.into())
    }

    /// Create a worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
