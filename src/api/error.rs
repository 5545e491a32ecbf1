// Transport-level errors from the job service. Higher-level classification
// (construction vs submission vs polling) happens in the pipeline layer.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Non-2xx response. The body is the JSON error payload when the service
    /// sent one, or the raw text otherwise.
    #[error("{endpoint} returned HTTP {status} {status_text}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        status_text: String,
        body: String,
    },
    /// The request never produced a response (connect, TLS, timeout).
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    /// A 2xx response whose body did not match the expected schema.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ApiError {
    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::Http { endpoint, .. }
            | ApiError::Transport { endpoint, .. }
            | ApiError::Decode { endpoint, .. } => endpoint,
        }
    }
}
