//! Error types for kiln-core.

use crate::session::SessionId;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for kiln-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Sandbox could not be created for the submission
    #[error("sandbox provisioning failed: {0}")]
    Provision(String),

    /// Sandbox was created but failed to start or attach
    #[error("sandbox start failed: {0}")]
    Start(String),

    /// I/O failure on the output/error channels after a successful start
    #[error("stream failure: {0}")]
    Stream(String),

    /// Execution deadline exceeded
    #[error("execution timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Input submitted to a session with no active input channel.
    /// The only non-fatal error: reported, session state unchanged.
    #[error("session {0} cannot accept input")]
    InputRejected(SessionId),

    /// Session not found
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// A session with this identifier already holds a sandbox
    #[error("session already exists: {0}")]
    AlreadyExists(SessionId),

    /// Submission rejected before provisioning (size or capacity limit)
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
