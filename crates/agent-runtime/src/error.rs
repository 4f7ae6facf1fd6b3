//! Error types for agent-runtime

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while running an agent session
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An event was published after the log closed
    #[error("Event log is closed")]
    LogClosed,

    /// Admission was attempted while an execution is in flight
    #[error("Agent is already running for session {session_id}")]
    AgentBusy { session_id: String },

    /// The execution was cancelled cooperatively
    #[error("Task cancelled")]
    Cancelled,

    /// The agent backend reported a failure
    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] bp_core::Error),
}

impl RuntimeError {
    /// Create an ExecutionFailed error
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }
}
