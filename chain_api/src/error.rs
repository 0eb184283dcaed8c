use thiserror::Error;

use crate::decode::DecodeError;

/// Failure reported by the upstream chain client for a single request.
#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("resource not found")]
    NotFound,
    #[error("connection failed: {message}")]
    Connection { message: String },
    #[error("response could not be decoded: {message}")]
    Decode { message: String },
}

impl ApiError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Failure of one logical request after retries.
#[derive(Clone, Debug, Error)]
pub enum FetchError {
    #[error("{key} timed out after {attempts} attempts")]
    Timeout { key: String, attempts: usize },
    #[error("{key} failed after {attempts} attempts")]
    Exhausted {
        key: String,
        attempts: usize,
        source: ApiError,
    },
    #[error("{key} returned an empty response")]
    EmptyResponse { key: String },
    #[error("{key} could not be decoded: {message}")]
    Decode { key: String, message: String },
    #[error("{key} was cancelled")]
    Cancelled { key: String },
}

impl FetchError {
    pub(crate) fn decode(key: &str, error: &DecodeError) -> Self {
        Self::Decode {
            key: key.to_owned(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
