use thiserror::Error;

/// Failures of a call to the conversation backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("conversation request has no messages")]
    EmptyRequest,

    #[error("request to conversation backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status. `error` is the JSON serialization of the body's `error` field.
    #[error("conversation backend returned {status}: {error}")]
    Status {
        status: reqwest::StatusCode,
        error: String,
    },

    #[error("invalid JSON from conversation backend: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Aborted,
}

impl ApiError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }
}
