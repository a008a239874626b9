use thiserror::Error;

/// Result type for rkms operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or serving data keys
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller input or construction parameters
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration file or validation failure
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport or consistency failure of the key/value store
    #[error("store error: {0}")]
    Store(String),

    /// Conditional write lost because the id is already present.
    /// Consumed by the resolver's retry loop, never returned to callers.
    #[error("id {0} already exists in the store")]
    IdAlreadyExists(String),

    /// A single region's KMS operation failed
    #[error("KMS error: {0}")]
    Kms(String),

    /// Every region failed to generate a new data key
    #[error("failed to generate a data key in all regions: {0}")]
    GenerateExhausted(String),

    /// A region failed to encrypt during fan-out, so the envelope would be incomplete
    #[error("failed to encrypt data key: {0}")]
    EncryptFailed(String),

    /// Every region failed to decrypt the stored envelope
    #[error("failed to decrypt data key in all regions: {0}")]
    DecryptExhausted(String),

    /// The caller's cancellation token fired
    #[error("operation was cancelled")]
    Cancelled,

    /// Impossible-state guards
    #[error("internal error: {0}")]
    Internal(String),
}
