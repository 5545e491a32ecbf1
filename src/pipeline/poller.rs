// ExecutionPoller: drives one execution token to a terminal state.
//
// Methods take `&mut self`, so one poller instance can only run one poll at
// a time; the orchestrator creates a poller per item to keep the
// one-poll-per-token discipline while letting distinct items poll
// concurrently.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::reply::JobReply;
use crate::api::types::{
    InscriptionSubmission, PrepareSubmission, UnsignedInscriptionTx, UnsignedPrepareTx,
};
use crate::api::JobServiceClient;
use crate::observability::api_metrics;
use crate::pipeline::error::PipelineError;
use crate::pipeline::step::Phase;

/// Polling cadence shared by both phases. `max_attempts: None` polls until a
/// terminal reply, matching the historically unbounded behaviour; the
/// default is bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between confirmation polls.
    pub confirm_interval: Duration,
    /// Delay between unsigned-transaction retrieval polls.
    pub retrieve_interval: Duration,
    /// In-progress replies tolerated before giving up, per poll.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            confirm_interval: Duration::from_millis(9_000),
            retrieve_interval: Duration::from_millis(5_000),
            max_attempts: Some(100),
        }
    }
}

/// Terminal result of confirmation polling, unified across phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub onchain: bool,
    pub txid: String,
    pub submitted_at: Option<String>,
}

impl SubmissionOutcome {
    /// The submission timestamp parsed as UTC, when the service sent one in
    /// RFC 3339 form.
    pub fn submitted_at_utc(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl From<PrepareSubmission> for SubmissionOutcome {
    fn from(s: PrepareSubmission) -> Self {
        Self {
            onchain: s.is_onchain(),
            txid: s.txid,
            submitted_at: Some(s.submission_time),
        }
    }
}

impl From<InscriptionSubmission> for SubmissionOutcome {
    fn from(s: InscriptionSubmission) -> Self {
        Self {
            // The inscription status endpoint only answers with a success
            // payload once the submission landed.
            onchain: true,
            txid: s.indexing_tx_id,
            submitted_at: s
                .all_shard_submissions
                .first()
                .map(|sh| sh.shard_submitted_tx_submitted_at.clone()),
        }
    }
}

pub struct ExecutionPoller {
    client: Arc<JobServiceClient>,
    policy: PollPolicy,
    cancel: watch::Receiver<bool>,
}

impl ExecutionPoller {
    pub fn new(
        client: Arc<JobServiceClient>,
        policy: PollPolicy,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            policy,
            cancel,
        }
    }

    /// Poll retrieve-unsigned-tx for the preparation phase until the payload
    /// is available.
    pub async fn await_unsigned_prepare(
        &mut self,
        token: &str,
    ) -> Result<UnsignedPrepareTx, PipelineError> {
        let client = Arc::clone(&self.client);
        let token = token.to_string();
        let interval = self.policy.retrieve_interval;
        self.poll_until("retrieve-unsigned-tx", interval, move || {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move { client.retrieve_unsigned_prepare_tx(&token).await }
        })
        .await
    }

    /// Poll retrieve-unsigned-tx for the inscription phase.
    pub async fn await_unsigned_inscription(
        &mut self,
        token: &str,
    ) -> Result<UnsignedInscriptionTx, PipelineError> {
        let client = Arc::clone(&self.client);
        let token = token.to_string();
        let interval = self.policy.retrieve_interval;
        self.poll_until("retrieve-unsigned-tx", interval, move || {
            let client = Arc::clone(&client);
            let token = token.clone();
            async move { client.retrieve_unsigned_inscribe_tx(&token).await }
        })
        .await
    }

    /// Poll retrieve-submission-status until the submission is on-chain. A
    /// preparation success payload that is not yet on-chain counts as
    /// in-progress.
    pub async fn await_confirmation(
        &mut self,
        phase: Phase,
        token: &str,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let client = Arc::clone(&self.client);
        let token = token.to_string();
        let interval = self.policy.confirm_interval;
        match phase {
            Phase::Preparation => {
                self.poll_until("retrieve-submission-status", interval, move || {
                    let client = Arc::clone(&client);
                    let token = token.clone();
                    async move {
                        Ok(match client.retrieve_prepare_submission(&token).await? {
                            JobReply::Success(s) if s.is_onchain() => {
                                JobReply::Success(SubmissionOutcome::from(s))
                            }
                            JobReply::Success(s) => JobReply::InProgress(format!(
                                "transaction {} not yet on-chain",
                                s.txid
                            )),
                            JobReply::InProgress(m) => JobReply::InProgress(m),
                            JobReply::TimedOut { detail } => JobReply::TimedOut { detail },
                            JobReply::Unexpected { payload } => JobReply::Unexpected { payload },
                        })
                    }
                })
                .await
            }
            Phase::Inscription => {
                self.poll_until("retrieve-submission-status", interval, move || {
                    let client = Arc::clone(&client);
                    let token = token.clone();
                    async move {
                        Ok(match client.retrieve_inscription_submission(&token).await? {
                            JobReply::Success(s) => JobReply::Success(SubmissionOutcome::from(s)),
                            JobReply::InProgress(m) => JobReply::InProgress(m),
                            JobReply::TimedOut { detail } => JobReply::TimedOut { detail },
                            JobReply::Unexpected { payload } => JobReply::Unexpected { payload },
                        })
                    }
                })
                .await
            }
        }
    }

    async fn poll_until<T, F, Fut>(
        &mut self,
        endpoint: &str,
        interval: Duration,
        mut fetch: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<JobReply<T>, ApiError>>,
    {
        let poll_id = Uuid::new_v4();
        let mut attempts: u32 = 0;
        loop {
            if *self.cancel.borrow() {
                return Err(PipelineError::Cancelled);
            }

            match fetch().await.map_err(PipelineError::Api)? {
                JobReply::Success(value) => {
                    info!(%poll_id, endpoint, attempts, "job reached terminal state");
                    return Ok(value);
                }
                JobReply::InProgress(marker) => {
                    attempts += 1;
                    api_metrics().record_poll();
                    if let Some(max) = self.policy.max_attempts {
                        if attempts >= max {
                            return Err(PipelineError::RetrievalTimeout {
                                endpoint: endpoint.to_string(),
                                detail: format!("no terminal state after {attempts} polls"),
                            });
                        }
                    }
                    debug!(%poll_id, endpoint, marker = %marker, attempts, "job still in progress");
                    self.wait_interval(interval).await?;
                }
                JobReply::TimedOut { detail } => {
                    return Err(PipelineError::RetrievalTimeout {
                        endpoint: endpoint.to_string(),
                        detail,
                    });
                }
                JobReply::Unexpected { payload } => {
                    return Err(PipelineError::UnexpectedResponse {
                        endpoint: endpoint.to_string(),
                        payload,
                    });
                }
            }
        }
    }

    /// Sleep one interval (with up to 10% jitter) or bail out as soon as the
    /// cancel flag flips.
    async fn wait_interval(&mut self, interval: Duration) -> Result<(), PipelineError> {
        let jitter_cap = (interval.as_millis() as u64 / 10).max(1);
        let jitter = Duration::from_millis(rand::rng().random_range(0..jitter_cap));
        tokio::select! {
            _ = tokio::time::sleep(interval + jitter) => Ok(()),
            _ = self.cancel.wait_for(|cancelled| *cancelled) => Err(PipelineError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_observed_cadence() {
        let policy = PollPolicy::default();
        assert_eq!(policy.confirm_interval, Duration::from_millis(9_000));
        assert_eq!(policy.retrieve_interval, Duration::from_millis(5_000));
        assert_eq!(policy.max_attempts, Some(100));
    }

    #[test]
    fn prepare_outcome_reflects_the_onchain_marker() {
        let outcome = SubmissionOutcome::from(PrepareSubmission {
            onchain: "on-chain".to_string(),
            submission_time: "2024-01-01T00:00:00Z".to_string(),
            txid: "tx1".to_string(),
        });
        assert!(outcome.onchain);
        assert_eq!(outcome.txid, "tx1");
        assert!(outcome.submitted_at_utc().is_some());

        let pending = SubmissionOutcome::from(PrepareSubmission {
            onchain: "not-on-chain".to_string(),
            submission_time: "2024-01-01T00:00:00Z".to_string(),
            txid: "tx1".to_string(),
        });
        assert!(!pending.onchain);
    }

    #[test]
    fn inscription_outcome_uses_the_indexing_txid() {
        let outcome = SubmissionOutcome::from(InscriptionSubmission {
            all_shard_submissions: vec![],
            indexing_tx_id: "itx-1".to_string(),
            onchain: vec!["itx-1".to_string()],
            not_onchain: vec![],
        });
        assert!(outcome.onchain);
        assert_eq!(outcome.txid, "itx-1");
        assert_eq!(outcome.submitted_at, None);
    }
}
