use thiserror::Error;

/// Failure taxonomy shared by every pivottrack crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing startup configuration, or a missing definition root.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A malformed tracking definition or tracking query field.
    #[error("validation error: {0}")]
    Validation(String),
    /// Unknown connector, missing capability or an unresolvable payload shape.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),
    /// Vendor API failure. Connectors convert this into an empty result.
    #[error("remote error: {0}")]
    Remote(String),
    /// The persisted store cannot be reached or refused a read/write.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// A recognized vendor payload lacks a mandatory field.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedSource(msg.into())
    }
}
