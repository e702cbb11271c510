//! Error types for kiln-runtime.

use thiserror::Error;

/// Result type alias for kiln-runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while managing a sandboxed process.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid runtime configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Interpreter process could not be spawned
    #[error("failed to spawn interpreter: {0}")]
    Spawn(String),

    /// Operation not valid for the runtime's current state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
