use shroud_queue::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer was cancelled")]
    Cancelled,

    #[error("transfer failed: {0}")]
    Failed(String),

    #[error("transfer already started")]
    AlreadyStarted,

    #[error("storage node unreachable: {0}")]
    Unreachable(String),

    #[error("file deletion failed with status {status}")]
    Deletion { status: u16 },

    #[error("unexpected part length for part {index}: expected {expected}, got {actual}")]
    PartLength {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("download output was dropped")]
    OutputClosed,

    #[error("transfer hook failed: {0}")]
    Hook(String),

    #[error("invalid file metadata: {0}")]
    Metadata(String),

    #[error("queue error: {0}")]
    Queue(QueueError),

    #[error("crypto error: {0}")]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error("protocol error: {0}")]
    Protocol(#[from] shroud_protocol::ProtocolError),

    #[error("type error: {0}")]
    Type(#[from] shroud_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<QueueError> for TransferError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => TransferError::Cancelled,
            other => TransferError::Queue(other),
        }
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
