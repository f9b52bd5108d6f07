use crate::resource::DetectedKind;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Decode(#[source] serde_json::Error),

    #[error("expected {expected} but got apiVersion={api_version:?}, kind={kind:?}")]
    UnsupportedReview {
        expected: String,
        api_version: String,
        kind: String,
    },

    #[error("admission review has no request")]
    MissingRequest,

    #[error("admission request has no object")]
    MissingObject,

    #[error("{source}")]
    ResourceDecode {
        kind: DetectedKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} has no annotations")]
    MissingAnnotations(String),

    #[error("{0}: {1}")]
    Serialization(String, #[source] serde_json::Error),

    #[error("original object is not a JSON document: {0}")]
    InvalidDocument(#[source] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Whether an envelope-level failure is caused by the caller's payload rather than by us.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::UnsupportedReview { .. } | Error::MissingRequest
        )
    }
}
