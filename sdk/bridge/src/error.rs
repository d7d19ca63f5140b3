//! Errors surfaced by the SDK.
//!
//! [`ValidationError`] comes from the engine crate and means no request was
//! sent. [`RemoteError`] means a request was sent and the service, or the
//! path to it, did not give the expected answer.

use policy_engine::ValidationError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{operation}: transport failure: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation}: service returned status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{operation}: service returned an empty response")]
    EmptyBody { operation: String },

    #[error("{operation}: response could not be decoded: {message}")]
    Undecodable { operation: String, message: String },

    #[error("{operation} failed with error code {code}: {message}")]
    Server {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    #[error("{operation}: change was not applied: {detail}")]
    Unverified { operation: String, detail: String },

    #[error("{operation}: unexpected response: {body}")]
    Unexpected { operation: String, body: String },
}

impl RemoteError {
    /// Server error code, when the failure carried one.
    pub fn code(&self) -> Option<i64> {
        match self {
            RemoteError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SdkError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SdkError::Validation(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SdkError::Remote(_))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
