//! Queue and sink error types

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("sink '{label}' delivers synchronously and has no queue")]
    NotQueued { label: String },

    #[error("sink '{label}' has no handler registered")]
    NoHandler { label: String },
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
