// Wire types for the remote job service. Field names follow the service's
// camelCase JSON exactly; nothing here is interpreted beyond deserialization.

use serde::{Deserialize, Serialize};

/// Returned by both construct-tx and submit endpoints: an opaque execution
/// token correlating the request to an asynchronous remote job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHandle {
    pub execution_arn: String,
    pub http_status: u16,
}

/// Request body for the preparation-phase construct endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructPrepareRequest {
    pub data: String,
    pub data_type: String,
    pub reward_addresses: Vec<String>,
    pub target_address: String,
    pub utxos: Vec<String>,
}

/// Whether the service should mint a token alongside the inscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintPolicy {
    NoMinting,
    Minting,
}

/// Request body for the inscription-phase construct endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructInscribeRequest {
    pub payload: String,
    pub payload_type: String,
    pub reward_addresses: Vec<String>,
    pub change_address: String,
    pub utxos: Vec<String>,
    pub mint_token_for_payload: MintPolicy,
}

/// Success payload of the preparation retrieve-unsigned-tx endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedPrepareTx {
    pub tx: String,
    pub ulid: String,
    #[serde(default)]
    pub txid: Option<String>,
}

/// Success payload of the inscription retrieve-unsigned-tx endpoint: one
/// indexing transaction plus zero-or-more shard transactions, all of which
/// must be signed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedInscriptionTx {
    pub indexing_tx: String,
    pub indexing_tx_id: String,
    pub object_ulid: String,
    #[serde(default)]
    pub shard_txs: Vec<String>,
    #[serde(default)]
    pub shard_tx_ids: Vec<String>,
}

/// Request body for the preparation submit endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPrepareRequest {
    pub tx: String,
    pub ulid: String,
    pub witness_set: String,
}

/// Request body for the inscription submit endpoint. Each entry pairs an
/// unsigned transaction with its witness, serialized as a two-element array.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInscribeRequest {
    pub indexing_tx_to_submit: (String, String),
    pub txs_to_submit: Vec<(String, String)>,
    pub ulid_of_object: String,
}

/// Success payload of the preparation retrieve-submission-status endpoint.
/// `onchain` is the literal string `"on-chain"` once confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareSubmission {
    pub onchain: String,
    pub submission_time: String,
    pub txid: String,
}

impl PrepareSubmission {
    pub fn is_onchain(&self) -> bool {
        self.onchain == "on-chain"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardSubmission {
    pub shard_submitted_data_hash: String,
    pub shard_submitted_tx_submitted_at: String,
    pub shard_submitted_txid: String,
}

/// Success payload of the inscription retrieve-submission-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionSubmission {
    #[serde(default)]
    pub all_shard_submissions: Vec<ShardSubmission>,
    pub indexing_tx_id: String,
    #[serde(default)]
    pub onchain: Vec<String>,
    #[serde(default)]
    pub not_onchain: Vec<String>,
}
