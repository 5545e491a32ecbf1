use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::reply::{classify_reply, JobReply};
use crate::api::types::{
    ConstructInscribeRequest, ConstructPrepareRequest, ExecutionHandle, InscriptionSubmission,
    PrepareSubmission, SubmitInscribeRequest, SubmitPrepareRequest, UnsignedInscriptionTx,
    UnsignedPrepareTx,
};
use crate::config::ApiConfig;
use crate::observability::api_metrics;
use crate::pipeline::step::Phase;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rate-limited client for the remote transaction job service.
///
/// Every request carries the static API key header and is throttled through
/// a shared rate limiter so pollers cannot stampede the service.
#[derive(Debug)]
pub struct JobServiceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl JobServiceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Self::with_rate_limit(base_url, api_key, 2, 10)
    }

    pub fn with_rate_limit(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_second: u32,
        burst_capacity: u32,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN),
        )
        .allow_burst(NonZeroU32::new(burst_capacity).unwrap_or(NonZeroU32::MIN));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self, ApiError> {
        Self::with_rate_limit(
            cfg.base_url.clone(),
            cfg.api_key.clone().unwrap_or_default(),
            cfg.rate_limit.requests_per_second,
            cfg.rate_limit.burst_capacity,
        )
    }

    fn endpoint_url(&self, phase: Phase, operation: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url.trim_end_matches('/'),
            phase.route_prefix(),
            operation
        )
    }

    /// POST a JSON body and return the raw response text. Non-2xx bodies are
    /// parsed defensively (JSON first, raw text fallback) and embedded in
    /// the error along with endpoint, status and status text.
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, ApiError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;
        api_metrics().record_request();
        debug!(endpoint = %endpoint, "posting to job service");

        let response = self
            .http
            .post(endpoint)
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                api_metrics().record_error();
                ApiError::Transport {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();
        let text = response.text().await.map_err(|e| {
            api_metrics().record_error();
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }
        })?;

        if !status.is_success() {
            api_metrics().record_error();
            let body = match serde_json::from_str::<Value>(&text) {
                Ok(v) => v.to_string(),
                Err(_) => text,
            };
            return Err(ApiError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                status_text,
                body,
            });
        }

        Ok(text)
    }

    async fn post_for<B: Serialize + ?Sized, R: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let text = self.post_json(endpoint, body).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    pub async fn construct_prepare_tx(
        &self,
        request: &ConstructPrepareRequest,
    ) -> Result<ExecutionHandle, ApiError> {
        let url = self.endpoint_url(Phase::Preparation, "construct-tx");
        self.post_for(&url, request).await
    }

    pub async fn construct_inscribe_tx(
        &self,
        request: &ConstructInscribeRequest,
    ) -> Result<ExecutionHandle, ApiError> {
        let url = self.endpoint_url(Phase::Inscription, "construct-tx");
        self.post_for(&url, request).await
    }

    /// The execution token travels as a bare JSON string body.
    pub async fn retrieve_unsigned_prepare_tx(
        &self,
        token: &str,
    ) -> Result<JobReply<UnsignedPrepareTx>, ApiError> {
        let url = self.endpoint_url(Phase::Preparation, "retrieve-unsigned-tx");
        let text = self.post_json(&url, token).await?;
        Ok(classify_reply(&text))
    }

    pub async fn retrieve_unsigned_inscribe_tx(
        &self,
        token: &str,
    ) -> Result<JobReply<UnsignedInscriptionTx>, ApiError> {
        let url = self.endpoint_url(Phase::Inscription, "retrieve-unsigned-tx");
        let text = self.post_json(&url, token).await?;
        Ok(classify_reply(&text))
    }

    pub async fn submit_prepared_tx(
        &self,
        request: &SubmitPrepareRequest,
    ) -> Result<ExecutionHandle, ApiError> {
        let url = self.endpoint_url(Phase::Preparation, "submit");
        self.post_for(&url, request).await
    }

    pub async fn submit_inscription_txs(
        &self,
        request: &SubmitInscribeRequest,
    ) -> Result<ExecutionHandle, ApiError> {
        let url = self.endpoint_url(Phase::Inscription, "submit");
        self.post_for(&url, request).await
    }

    pub async fn retrieve_prepare_submission(
        &self,
        token: &str,
    ) -> Result<JobReply<PrepareSubmission>, ApiError> {
        let url = self.endpoint_url(Phase::Preparation, "retrieve-submission-status");
        let text = self.post_json(&url, token).await?;
        Ok(classify_reply(&text))
    }

    pub async fn retrieve_inscription_submission(
        &self,
        token: &str,
    ) -> Result<JobReply<InscriptionSubmission>, ApiError> {
        let url = self.endpoint_url(Phase::Inscription, "retrieve-submission-status");
        let text = self.post_json(&url, token).await?;
        Ok(classify_reply(&text))
    }
}
