use thiserror::Error;

pub type SealgateResult<T> = Result<T, SealgateError>;

/// Every failure a gateway operation can report.
///
/// The `Display` text of each variant is what ends up after `ERROR ` on the
/// wire, so none of them may contain a newline.
#[derive(Debug, Error)]
pub enum SealgateError {
    #[error("config error: {0}")]
    Config(String),

    #[error("entropy source failure: {0}")]
    Randomness(String),

    #[error("invalid key size: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeySize(usize),

    #[error("Malformed request")]
    MalformedRequest,

    #[error(transparent)]
    Decode(#[from] hex::FromHexError),

    #[error("malformed envelope: {len} bytes (minimum {min})")]
    MalformedEnvelope { len: usize, min: usize },

    #[error("message authentication failed")]
    Authentication,

    #[error("record encryption failed")]
    Encryption,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("network error: {0}")]
    Network(#[from] std::io::Error),
}

impl SealgateError {
    /// True when the backend reported that no entry exists for the id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SealgateError::Backend(BackendError::NotFound))
    }
}

/// Failures surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("record not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),

    /// An `ERROR` line returned by a remote backend server, verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("backend network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("backend protocol error: {0}")]
    Protocol(String),
}
