use shroud_types::PathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("{kind} {item:?} not found")]
    NotFound { kind: &'static str, item: String },

    #[error("{kind} {item:?} already exists")]
    AlreadyExists { kind: &'static str, item: String },

    #[error("{kind} {item:?} must be empty to {action}")]
    NotEmpty {
        kind: &'static str,
        item: String,
        action: &'static str,
    },

    #[error("invalid length of {item:?}: expected between 1 and {max}, got {actual}")]
    InvalidLength {
        item: String,
        max: usize,
        actual: usize,
    },

    #[error("{item:?} includes illegal characters")]
    IllegalCharacter { item: String },

    #[error("invalid account record: {0}")]
    Record(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] shroud_metadata::MetadataError),

    #[error("transfer error: {0}")]
    Transfer(#[from] shroud_transfer::TransferError),

    #[error("document error: {0}")]
    Doc(#[from] shroud_doc::DocError),

    #[error("crypto error: {0}")]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error("type error: {0}")]
    Type(#[from] shroud_types::TypeError),
}

impl SdkError {
    pub(crate) fn not_found(kind: &'static str, item: impl Into<String>) -> Self {
        SdkError::NotFound {
            kind,
            item: item.into(),
        }
    }
}

impl From<PathError> for SdkError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::InvalidLength { item, max, actual } => {
                SdkError::InvalidLength { item, max, actual }
            }
            PathError::IllegalCharacter { item } => SdkError::IllegalCharacter { item },
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
