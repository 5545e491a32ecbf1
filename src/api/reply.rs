// Single classification point for asynchronous-job replies.
//
// Every poll-style endpoint answers with one of the same shapes: a `success`
// object, an `inProgress` marker, a timeout/decode sentinel embedded in the
// body text, or something unexpected. Both pollers consume this one tagged
// type instead of probing fields ad hoc.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Body substrings the service emits when the remote state machine timed out
/// or produced undecodable output. Polling must stop on these.
const TIMEOUT_SENTINELS: &[&str] = &["States.Timeout", "JsonDecodeError"];

/// Classified reply from a retrieve-style endpoint.
#[derive(Debug, Clone)]
pub enum JobReply<T> {
    /// The job finished and produced a payload.
    Success(T),
    /// The job is still running; the marker text is informational only.
    InProgress(String),
    /// The body carried the timeout/decode sentinel; do not retry.
    TimedOut { detail: String },
    /// Neither `success` nor `inProgress` was present, or the success payload
    /// did not match the expected schema. The raw payload is kept for
    /// diagnostics.
    Unexpected { payload: Value },
}

/// Classify a raw response body into exactly one [`JobReply`] case.
pub fn classify_reply<T: DeserializeOwned>(body: &str) -> JobReply<T> {
    if TIMEOUT_SENTINELS.iter().any(|s| body.contains(s)) {
        return JobReply::TimedOut {
            detail: body.to_string(),
        };
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return JobReply::Unexpected {
                payload: Value::String(body.to_string()),
            }
        }
    };

    if let Some(success) = value.get("success") {
        match serde_json::from_value::<T>(success.clone()) {
            Ok(parsed) => return JobReply::Success(parsed),
            Err(_) => return JobReply::Unexpected { payload: value },
        }
    }

    if let Some(marker) = value.get("inProgress").and_then(Value::as_str) {
        return JobReply::InProgress(marker.to_string());
    }

    JobReply::Unexpected { payload: value }
}
