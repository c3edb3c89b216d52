use thiserror::Error;

/// Error a committer may return. It is fatal for the queue.
pub type CommitError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the ordered queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("committer for sequence {sequence} failed: {reason}")]
    CommitFailed { sequence: u64, reason: String },

    #[error("queue was cancelled")]
    Cancelled,

    #[error("queue is closed to new work")]
    Closed,

    #[error("out-of-order add: expected sequence {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },
}

pub type QueueResult<T> = Result<T, QueueError>;
