use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document {0} has no private key and cannot be written")]
    ReadOnly(String),

    #[error("malformed metadata index entry: {0}")]
    Index(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] shroud_crypto::CryptoError),

    #[error("protocol error: {0}")]
    Protocol(#[from] shroud_protocol::ProtocolError),

    #[error("DAG error: {0}")]
    Dag(#[from] shroud_dag::DagError),

    #[error("document error: {0}")]
    Doc(#[from] shroud_doc::DocError),
}

pub type MetadataResult<T> = Result<T, MetadataError>;
