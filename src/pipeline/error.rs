// Pipeline error taxonomy. Every variant is cheap to clone so the current
// error can both be returned to the caller and retained on the phase machine.

use serde_json::Value;
use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// The remote construct call failed. Non-recoverable for the attempt;
    /// the user may retry the whole phase.
    #[error("transaction construction failed: {0}")]
    Construction(ApiError),

    /// Polling hit the service's timeout/decode sentinel, or exhausted the
    /// configured attempt budget. Non-recoverable; retry later.
    #[error("transaction processing timed out or returned incomplete data ({endpoint}): {detail}")]
    RetrievalTimeout { endpoint: String, detail: String },

    /// The user rejected the signing prompt or the wallet reported a signing
    /// failure. The only recoverable class: step and cached payloads are
    /// preserved and the same signing call may be retried.
    #[error("Wallet signing error: {info}")]
    WalletSigning { info: String },

    /// The remote submit call failed.
    #[error("transaction submission failed: {0}")]
    Submission(ApiError),

    /// A response carried neither a success nor an in-progress marker, or
    /// the success payload did not match its schema. The raw payload is kept
    /// for diagnostics.
    #[error("unexpected response shape from {endpoint}: {payload}")]
    UnexpectedResponse { endpoint: String, payload: Value },

    /// The wallet side failed outside of signing: no default wallet, no
    /// UTXOs, a capability query error, or a malformed payload handed to it.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// A remote call outside construct/submit failed at the HTTP layer.
    #[error("{0}")]
    Api(ApiError),

    /// The payload failed intake validation (content type, size).
    #[error("invalid payload: {0}")]
    Payload(String),

    /// The inscription pipeline was invoked before preparation confirmed
    /// on-chain.
    #[error("preparation has not been confirmed on-chain")]
    PreparationNotConfirmed,

    /// The user cancelled the operation; state has been reset by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether the error supports an in-place retry of the failing call.
    /// Only signing rejections qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::WalletSigning { .. })
    }

    /// The user-facing rendering. Signing and timeout errors carry their own
    /// guidance; everything else collapses to a generic processing failure
    /// while the structured error remains available for support.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::WalletSigning { .. } => self.to_string(),
            PipelineError::RetrievalTimeout { .. } => {
                "Transaction processing timed out or encountered a decoding error. \
                 Please try again later."
                    .to_string()
            }
            PipelineError::PreparationNotConfirmed => self.to_string(),
            PipelineError::Cancelled => self.to_string(),
            _ => "Transaction processing failed.".to_string(),
        }
    }
}
