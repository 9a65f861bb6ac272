//! Error types shared by the poller, dispatcher, cache and generator.

use serde::Serialize;

use crate::logic::record::SourceId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail")]
pub enum Error {
    /// Connection or query failure against the record store
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Payload could not be decoded or classified
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Removal or trigger aimed at a source nobody knows about
    #[error("source {0} not found")]
    SourceNotFound(SourceId),

    /// Missing or unparsable request field
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Classifier failed for a reason other than the payload (timeout, worker panic)
    #[error("classifier error: {0}")]
    Classifier(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Stable short name, used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::StorageUnavailable(_) => "storage_unavailable",
            Error::MalformedPayload(_) => "malformed_payload",
            Error::SourceNotFound(_) => "source_not_found",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Classifier(_) => "classifier",
            Error::Config(_) => "config",
        }
    }

    /// Errors the caller caused, as opposed to failures of the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::SourceNotFound(_) | Error::InvalidRequest(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}
