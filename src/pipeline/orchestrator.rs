// SubmissionOrchestrator: owns both phase machines and drives the per-phase
// construct -> retrieve -> sign -> submit -> confirm pipeline, gating the
// inscription phase on a confirmed preparation outcome.
//
// Step advancement is guarded on the expected pre-advance step, so the phase
// position tracks the leading item when several items run through one phase.
// Items are processed strictly in order; each gets its own poller so no two
// polls share a token.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, instrument};

use crate::api::error::ApiError;
use crate::api::types::{
    ConstructInscribeRequest, ConstructPrepareRequest, MintPolicy, SubmitInscribeRequest,
    SubmitPrepareRequest, UnsignedInscriptionTx, UnsignedPrepareTx,
};
use crate::api::JobServiceClient;
use crate::encoding;
use crate::payload::Payload;
use crate::pipeline::error::PipelineError;
use crate::pipeline::machine::PhaseStateMachine;
use crate::pipeline::poller::{ExecutionPoller, PollPolicy, SubmissionOutcome};
use crate::pipeline::step::{Phase, Step};
use crate::pipeline::work_item::{UnsignedPayload, WorkItemStatus, WorkItemUpdate};
use crate::wallet::signing::{SigningCoordinator, SigningError};
use crate::wallet::store::DefaultWalletStore;
use crate::wallet::WalletConnector;

/// Clonable handle that flips a phase's cancel flag. In-flight pollers
/// observe it at their next suspension point.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Wallet-derived inputs for a construct call.
struct WalletInputs {
    reward_addresses: Vec<String>,
    utxos: Vec<String>,
    target_address: String,
}

pub struct SubmissionOrchestrator {
    client: Arc<JobServiceClient>,
    connector: Arc<dyn WalletConnector>,
    wallet_store: Arc<dyn DefaultWalletStore>,
    signing: SigningCoordinator,
    poll_policy: PollPolicy,
    preparation: PhaseStateMachine,
    inscription: PhaseStateMachine,
    preparation_outcome: Option<SubmissionOutcome>,
    inscription_outcome: Option<SubmissionOutcome>,
    prep_cancel: watch::Sender<bool>,
    insc_cancel: watch::Sender<bool>,
}

impl SubmissionOrchestrator {
    pub fn new(
        client: Arc<JobServiceClient>,
        connector: Arc<dyn WalletConnector>,
        wallet_store: Arc<dyn DefaultWalletStore>,
    ) -> Self {
        let signing = SigningCoordinator::new(Arc::clone(&connector));
        let (prep_cancel, _) = watch::channel(false);
        let (insc_cancel, _) = watch::channel(false);
        Self {
            client,
            connector,
            wallet_store,
            signing,
            poll_policy: PollPolicy::default(),
            preparation: PhaseStateMachine::new(Phase::Preparation),
            inscription: PhaseStateMachine::new(Phase::Inscription),
            preparation_outcome: None,
            inscription_outcome: None,
            prep_cancel,
            insc_cancel,
        }
    }

    /// Build an orchestrator from configuration plus the injected wallet
    /// collaborators.
    pub fn from_config(
        cfg: &crate::config::ChainscribeConfig,
        connector: Arc<dyn WalletConnector>,
        wallet_store: Arc<dyn DefaultWalletStore>,
    ) -> Result<Self, ApiError> {
        let client = Arc::new(JobServiceClient::from_config(&cfg.api)?);
        Ok(Self::new(client, connector, wallet_store).with_poll_policy((&cfg.pipeline).into()))
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    pub fn preparation(&self) -> &PhaseStateMachine {
        &self.preparation
    }

    pub fn inscription(&self) -> &PhaseStateMachine {
        &self.inscription
    }

    pub fn machine(&self, phase: Phase) -> &PhaseStateMachine {
        match phase {
            Phase::Preparation => &self.preparation,
            Phase::Inscription => &self.inscription,
        }
    }

    fn machine_mut(&mut self, phase: Phase) -> &mut PhaseStateMachine {
        match phase {
            Phase::Preparation => &mut self.preparation,
            Phase::Inscription => &mut self.inscription,
        }
    }

    pub fn preparation_outcome(&self) -> Option<&SubmissionOutcome> {
        self.preparation_outcome.as_ref()
    }

    pub fn inscription_outcome(&self) -> Option<&SubmissionOutcome> {
        self.inscription_outcome.as_ref()
    }

    /// The cross-phase gate: inscription may start only once preparation has
    /// a confirmed on-chain outcome. This is the single source of truth.
    pub fn preparation_confirmed(&self) -> bool {
        self.preparation_outcome
            .as_ref()
            .is_some_and(|outcome| outcome.onchain)
    }

    /// Clear a phase's current error without touching its step or items.
    pub fn clear_error(&mut self, phase: Phase) {
        self.machine_mut(phase).clear_error();
    }

    /// Reset a phase to its first step, dropping items, cached tokens and
    /// payloads, and any recorded outcome.
    pub fn reset(&mut self, phase: Phase) {
        self.machine_mut(phase).reset();
        match phase {
            Phase::Preparation => self.preparation_outcome = None,
            Phase::Inscription => self.inscription_outcome = None,
        }
    }

    /// A handle for cancelling the phase from another task. The in-flight
    /// poll returns [`PipelineError::Cancelled`] and the pipeline method
    /// resets the phase before returning.
    pub fn cancel_handle(&self, phase: Phase) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_sender(phase).clone(),
        }
    }

    /// Cancel a phase directly: flip the flag for any in-flight poller and
    /// reset the machine.
    pub fn cancel(&mut self, phase: Phase) {
        self.cancel_sender(phase).send_replace(true);
        self.reset(phase);
    }

    fn cancel_sender(&self, phase: Phase) -> &watch::Sender<bool> {
        match phase {
            Phase::Preparation => &self.prep_cancel,
            Phase::Inscription => &self.insc_cancel,
        }
    }

    fn rearm_cancel(&self, phase: Phase) {
        self.cancel_sender(phase).send_replace(false);
    }

    fn poller(&self, phase: Phase) -> ExecutionPoller {
        ExecutionPoller::new(
            Arc::clone(&self.client),
            self.poll_policy.clone(),
            self.cancel_sender(phase).subscribe(),
        )
    }

    fn default_wallet(&self) -> Result<String, PipelineError> {
        self.wallet_store
            .default_wallet()
            .ok_or_else(|| PipelineError::Wallet("no wallet connected".to_string()))
    }

    async fn wallet_inputs(&self) -> Result<WalletInputs, PipelineError> {
        let wallet = self.default_wallet()?;
        let api = self
            .connector
            .wallet_api(&wallet)
            .await
            .map_err(|e| PipelineError::Wallet(e.to_string()))?;

        let reward_addresses = api
            .get_reward_addresses()
            .await
            .map_err(|e| PipelineError::Wallet(e.to_string()))?;
        let utxos = api
            .get_utxos()
            .await
            .map_err(|e| PipelineError::Wallet(e.to_string()))?;
        if utxos.is_empty() {
            return Err(PipelineError::Wallet("no UTXOs available".to_string()));
        }
        let target_address = api
            .get_used_addresses()
            .await
            .map_err(|e| PipelineError::Wallet(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Wallet("wallet has no used addresses".to_string()))?;

        Ok(WalletInputs {
            reward_addresses,
            utxos,
            target_address,
        })
    }

    /// Run the preparation construct step for an ordered list of payloads.
    #[instrument(skip_all, fields(phase = "preparation", items = payloads.len()))]
    pub async fn prepare(&mut self, payloads: Vec<Payload>) -> Result<(), PipelineError> {
        self.run_construct(Phase::Preparation, payloads).await
    }

    /// Wrap a text blob as `text/plain` and run the preparation construct
    /// step for it.
    pub async fn prepare_text(&mut self, text: &str) -> Result<(), PipelineError> {
        let payload =
            Payload::from_text(text).map_err(|e| PipelineError::Payload(e.to_string()))?;
        self.prepare(vec![payload]).await
    }

    /// Run the inscription construct step. Refused until preparation has
    /// confirmed on-chain.
    #[instrument(skip_all, fields(phase = "inscription", items = payloads.len()))]
    pub async fn inscribe(&mut self, payloads: Vec<Payload>) -> Result<(), PipelineError> {
        if !self.preparation_confirmed() {
            return Err(PipelineError::PreparationNotConfirmed);
        }
        self.run_construct(Phase::Inscription, payloads).await
    }

    pub async fn inscribe_text(&mut self, text: &str) -> Result<(), PipelineError> {
        let payload =
            Payload::from_text(text).map_err(|e| PipelineError::Payload(e.to_string()))?;
        self.inscribe(vec![payload]).await
    }

    async fn run_construct(
        &mut self,
        phase: Phase,
        payloads: Vec<Payload>,
    ) -> Result<(), PipelineError> {
        self.rearm_cancel(phase);
        {
            let machine = self.machine_mut(phase);
            machine.clear_error();
            machine.begin(payloads);
            machine.set_processing(true);
        }

        let result = self.construct_items(phase).await;
        match &result {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => self.machine_mut(phase).reset(),
            Err(e) => {
                // Construction failures leave the step where it is; the user
                // retries the phase from the top.
                self.machine_mut(phase).set_error(e.clone());
                self.machine_mut(phase).fail_all_items();
            }
        }
        self.machine_mut(phase).set_processing(false);
        result
    }

    async fn construct_items(&mut self, phase: Phase) -> Result<(), PipelineError> {
        let payloads: Vec<Payload> = self
            .machine(phase)
            .items()
            .iter()
            .map(|item| item.payload.clone())
            .collect();

        for (i, payload) in payloads.iter().enumerate() {
            self.machine_mut(phase).update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Constructing),
                    progress: Some(25),
                    ..Default::default()
                },
            );

            let inputs = self.wallet_inputs().await?;
            let handle = match phase {
                Phase::Preparation => {
                    let request = ConstructPrepareRequest {
                        data: payload.to_base64(),
                        data_type: payload.content_type().to_string(),
                        reward_addresses: inputs.reward_addresses,
                        target_address: inputs.target_address,
                        utxos: inputs.utxos,
                    };
                    self.client
                        .construct_prepare_tx(&request)
                        .await
                        .map_err(PipelineError::Construction)?
                }
                Phase::Inscription => {
                    let request = ConstructInscribeRequest {
                        payload: payload.to_base64(),
                        payload_type: payload.content_type().to_string(),
                        reward_addresses: inputs.reward_addresses,
                        change_address: inputs.target_address,
                        utxos: inputs.utxos,
                        mint_token_for_payload: MintPolicy::NoMinting,
                    };
                    self.client
                        .construct_inscribe_tx(&request)
                        .await
                        .map_err(PipelineError::Construction)?
                }
            };

            info!(phase = %phase, item = i, token = %handle.execution_arn, "transaction constructed");
            self.machine_mut(phase).update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Unsigned),
                    progress: Some(50),
                    constructed: Some(handle),
                    ..Default::default()
                },
            );
        }

        // Construct succeeded for every item; the phase leaves Construct.
        if self.machine(phase).current_step() == Step::Construct {
            self.machine_mut(phase).advance();
        }
        Ok(())
    }

    /// Drive every constructed preparation item through retrieve -> sign ->
    /// submit -> confirm. A signing rejection preserves all progress for an
    /// in-place retry.
    #[instrument(skip_all, fields(phase = "preparation"))]
    pub async fn sign_and_submit_preparation(&mut self) -> Result<(), PipelineError> {
        self.rearm_cancel(Phase::Preparation);
        self.preparation.set_processing(true);
        let result = self.drive_preparation_items().await;
        self.preparation.set_processing(false);
        match &result {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => self.preparation.reset(),
            Err(e) if e.is_retryable() => self.preparation.set_error(e.clone()),
            Err(e) => {
                self.preparation.set_error(e.clone());
                self.preparation.fail_all_items();
            }
        }
        result
    }

    async fn drive_preparation_items(&mut self) -> Result<(), PipelineError> {
        let item_count = self.preparation.items().len();
        for i in 0..item_count {
            let Some(token) = self
                .preparation
                .item(i)
                .and_then(|item| item.tx_info.constructed.as_ref())
                .map(|handle| handle.execution_arn.clone())
            else {
                continue;
            };

            // Retrieve the unsigned transaction, unless a previous attempt
            // already cached it; a signing retry must not refetch.
            let cached = self.preparation.item(i).and_then(|item| {
                match &item.tx_info.unsigned {
                    Some(UnsignedPayload::Prepare(tx)) => Some(tx.clone()),
                    _ => None,
                }
            });
            let unsigned: UnsignedPrepareTx = match cached {
                Some(tx) => tx,
                None => {
                    let mut poller = self.poller(Phase::Preparation);
                    let tx = poller.await_unsigned_prepare(&token).await?;
                    self.preparation.update_item(
                        i,
                        WorkItemUpdate {
                            progress: Some(75),
                            unsigned: Some(UnsignedPayload::Prepare(tx.clone())),
                            unsigned_txid: tx.txid.clone(),
                            ..Default::default()
                        },
                    );
                    tx
                }
            };

            // Sign, with any stale error cleared first so a retry starts
            // clean. The coordinator fetches a fresh wallet handle itself.
            if matches!(
                self.preparation.error(),
                Some(PipelineError::WalletSigning { .. })
            ) {
                crate::observability::api_metrics().record_signing_retry();
            }
            self.preparation.clear_error();
            let wallet = self.default_wallet()?;
            let tx_hex = encoding::base64_to_hex(&unsigned.tx).map_err(|e| {
                PipelineError::Api(ApiError::Decode {
                    endpoint: "retrieve-unsigned-tx".to_string(),
                    message: e.to_string(),
                })
            })?;
            let witness = match self.signing.sign_payload(&wallet, &tx_hex).await {
                Ok(witness) => witness,
                Err(SigningError::Wallet { info }) => {
                    self.preparation.update_item(
                        i,
                        WorkItemUpdate {
                            status: Some(WorkItemStatus::Unsigned),
                            progress: Some(75),
                            error: Some(info.clone()),
                            ..Default::default()
                        },
                    );
                    return Err(PipelineError::WalletSigning { info });
                }
                Err(SigningError::Other(message)) => {
                    return Err(PipelineError::Wallet(message));
                }
            };
            self.preparation.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Signed),
                    progress: Some(85),
                    witness: Some(witness.clone()),
                    clear_error: true,
                    ..Default::default()
                },
            );
            if self.preparation.current_step() == Step::Retrieve {
                self.preparation.advance();
            }

            // Submit the witnessed transaction.
            let request = SubmitPrepareRequest {
                tx: unsigned.tx.clone(),
                ulid: unsigned.ulid.clone(),
                witness_set: witness,
            };
            let submitted = self
                .client
                .submit_prepared_tx(&request)
                .await
                .map_err(PipelineError::Submission)?;
            self.preparation.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Submitted),
                    progress: Some(95),
                    submitted: Some(submitted.clone()),
                    ..Default::default()
                },
            );
            if self.preparation.current_step() == Step::Submit {
                self.preparation.advance();
            }

            // Poll until on-chain.
            let mut poller = self.poller(Phase::Preparation);
            let outcome = match poller
                .await_confirmation(Phase::Preparation, &submitted.execution_arn)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.preparation.update_item(
                        i,
                        WorkItemUpdate {
                            status: Some(WorkItemStatus::Failed),
                            progress: Some(0),
                            ..Default::default()
                        },
                    );
                    return Err(e);
                }
            };
            self.preparation.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Confirmed),
                    progress: Some(100),
                    clear_error: true,
                    ..Default::default()
                },
            );
            // Terminal for preparation; the advance is the contractual no-op.
            self.preparation.advance();
            info!(txid = %outcome.txid, "preparation confirmed on-chain");
            self.preparation_outcome = Some(outcome);
        }
        Ok(())
    }

    /// Drive every constructed inscription item through retrieve -> sign
    /// (indexing plus shards) -> submit -> confirm. Signing rejections keep
    /// all cached witnesses so a retry signs only what is missing; other
    /// errors end the phase at its terminal step.
    #[instrument(skip_all, fields(phase = "inscription"))]
    pub async fn sign_and_submit_inscription(&mut self) -> Result<(), PipelineError> {
        self.rearm_cancel(Phase::Inscription);
        self.inscription.set_processing(true);
        let result = self.drive_inscription_items().await;
        self.inscription.set_processing(false);
        match &result {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => self.inscription.reset(),
            Err(e) if e.is_retryable() => self.inscription.set_error(e.clone()),
            Err(e) => {
                self.inscription.set_error(e.clone());
                self.inscription.fail_all_items();
                self.inscription.finish();
            }
        }
        result
    }

    async fn drive_inscription_items(&mut self) -> Result<(), PipelineError> {
        let item_count = self.inscription.items().len();
        for i in 0..item_count {
            let Some(token) = self
                .inscription
                .item(i)
                .and_then(|item| item.tx_info.constructed.as_ref())
                .map(|handle| handle.execution_arn.clone())
            else {
                continue;
            };

            let cached = self.inscription.item(i).and_then(|item| {
                match &item.tx_info.unsigned {
                    Some(UnsignedPayload::Inscription(tx)) => Some(tx.clone()),
                    _ => None,
                }
            });
            let unsigned: UnsignedInscriptionTx = match cached {
                Some(tx) => tx,
                None => {
                    let mut poller = self.poller(Phase::Inscription);
                    let tx = poller.await_unsigned_inscription(&token).await?;
                    self.inscription.update_item(
                        i,
                        WorkItemUpdate {
                            progress: Some(75),
                            unsigned: Some(UnsignedPayload::Inscription(tx.clone())),
                            unsigned_txid: Some(tx.indexing_tx_id.clone()),
                            ..Default::default()
                        },
                    );
                    tx
                }
            };

            if matches!(
                self.inscription.error(),
                Some(PipelineError::WalletSigning { .. })
            ) {
                crate::observability::api_metrics().record_signing_retry();
            }
            self.inscription.clear_error();
            let wallet = self.default_wallet()?;

            // Indexing transaction first; skipped when a prior attempt
            // already produced its witness.
            let witness = match self
                .inscription
                .item(i)
                .and_then(|item| item.tx_info.witness.clone())
            {
                Some(witness) => witness,
                None => {
                    let tx_hex = encoding::base64_to_hex(&unsigned.indexing_tx).map_err(|e| {
                        PipelineError::Api(ApiError::Decode {
                            endpoint: "retrieve-unsigned-tx".to_string(),
                            message: e.to_string(),
                        })
                    })?;
                    match self.signing.sign_payload(&wallet, &tx_hex).await {
                        Ok(witness) => {
                            self.inscription.update_item(
                                i,
                                WorkItemUpdate {
                                    status: Some(WorkItemStatus::Signed),
                                    progress: Some(85),
                                    witness: Some(witness.clone()),
                                    clear_error: true,
                                    ..Default::default()
                                },
                            );
                            witness
                        }
                        Err(SigningError::Wallet { info }) => {
                            self.inscription.update_item(
                                i,
                                WorkItemUpdate {
                                    status: Some(WorkItemStatus::Unsigned),
                                    progress: Some(75),
                                    error: Some(info.clone()),
                                    ..Default::default()
                                },
                            );
                            return Err(PipelineError::WalletSigning { info });
                        }
                        Err(SigningError::Other(message)) => {
                            return Err(PipelineError::Wallet(message));
                        }
                    }
                }
            };

            // Shard transactions, one signing call each, every call on a
            // freshly fetched handle. Already-signed shards are skipped.
            for (shard_index, shard_tx) in unsigned.shard_txs.iter().enumerate() {
                let already_signed = self
                    .inscription
                    .item(i)
                    .and_then(|item| item.tx_info.shard_witnesses.get(shard_index).cloned())
                    .flatten()
                    .is_some();
                if already_signed {
                    continue;
                }

                let shard_hex = encoding::base64_to_hex(shard_tx).map_err(|e| {
                    PipelineError::Api(ApiError::Decode {
                        endpoint: "retrieve-unsigned-tx".to_string(),
                        message: e.to_string(),
                    })
                })?;
                match self.signing.sign_payload(&wallet, &shard_hex).await {
                    Ok(shard_witness) => {
                        self.inscription.update_item(
                            i,
                            WorkItemUpdate {
                                shard_witness: Some((shard_index, shard_witness)),
                                ..Default::default()
                            },
                        );
                    }
                    Err(SigningError::Wallet { info }) => {
                        self.inscription.update_item(
                            i,
                            WorkItemUpdate {
                                status: Some(WorkItemStatus::Unsigned),
                                progress: Some(75),
                                error: Some(info.clone()),
                                ..Default::default()
                            },
                        );
                        return Err(PipelineError::WalletSigning { info });
                    }
                    Err(SigningError::Other(message)) => {
                        return Err(PipelineError::Wallet(message));
                    }
                }
            }
            self.inscription.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Signed),
                    progress: Some(90),
                    clear_error: true,
                    ..Default::default()
                },
            );
            if self.inscription.current_step() == Step::Retrieve {
                self.inscription.advance();
            }

            // Submit the indexing transaction and every shard with their
            // witnesses.
            let shard_witnesses = self
                .inscription
                .item(i)
                .map(|item| item.tx_info.shard_witnesses.clone())
                .unwrap_or_default();
            let mut txs_to_submit = Vec::with_capacity(unsigned.shard_txs.len());
            for (shard_index, shard_tx) in unsigned.shard_txs.iter().enumerate() {
                let shard_witness = shard_witnesses
                    .get(shard_index)
                    .cloned()
                    .flatten()
                    .ok_or_else(|| {
                        PipelineError::Wallet(format!("missing witness for shard {shard_index}"))
                    })?;
                txs_to_submit.push((shard_tx.clone(), shard_witness));
            }
            let request = SubmitInscribeRequest {
                indexing_tx_to_submit: (unsigned.indexing_tx.clone(), witness),
                txs_to_submit,
                ulid_of_object: unsigned.object_ulid.clone(),
            };
            let submitted = self
                .client
                .submit_inscription_txs(&request)
                .await
                .map_err(PipelineError::Submission)?;
            self.inscription.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Submitted),
                    progress: Some(95),
                    submitted: Some(submitted.clone()),
                    ..Default::default()
                },
            );
            if self.inscription.current_step() == Step::Submit {
                self.inscription.advance();
            }

            let mut poller = self.poller(Phase::Inscription);
            let outcome = match poller
                .await_confirmation(Phase::Inscription, &submitted.execution_arn)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.inscription.update_item(
                        i,
                        WorkItemUpdate {
                            status: Some(WorkItemStatus::Failed),
                            progress: Some(0),
                            ..Default::default()
                        },
                    );
                    return Err(e);
                }
            };
            self.inscription.update_item(
                i,
                WorkItemUpdate {
                    status: Some(WorkItemStatus::Confirmed),
                    progress: Some(100),
                    clear_error: true,
                    ..Default::default()
                },
            );
            if self.inscription.current_step() == Step::RetrieveSubmission {
                self.inscription.advance();
            }
            info!(txid = %outcome.txid, "inscription confirmed on-chain");
            self.inscription_outcome = Some(outcome);
        }
        Ok(())
    }
}
