// WorkItem: one payload tracked through a phase, with its accumulating
// transaction info. All mutation flows through `apply` so partial updates
// merge instead of clobbering earlier progress.

use serde::{Deserialize, Serialize};

use crate::api::types::{ExecutionHandle, UnsignedInscriptionTx, UnsignedPrepareTx};
use crate::payload::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemStatus {
    Pending,
    Constructing,
    Unsigned,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl WorkItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkItemStatus::Confirmed | WorkItemStatus::Failed)
    }
}

/// The unsigned payload cached after the retrieve step; kept so a signing
/// retry never refetches or reconstructs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedPayload {
    Prepare(UnsignedPrepareTx),
    Inscription(UnsignedInscriptionTx),
}

/// Everything known so far about an item's transactions, filled in as the
/// pipeline progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxInfo {
    /// Execution token returned by the construct call.
    pub constructed: Option<ExecutionHandle>,
    /// Cached unsigned transaction payload(s).
    pub unsigned: Option<UnsignedPayload>,
    /// Transaction id reported alongside the unsigned payload, when present.
    pub unsigned_txid: Option<String>,
    /// Witness for the primary (or indexing) transaction.
    pub witness: Option<String>,
    /// Witnesses for shard transactions, indexed like `shard_txs`. Partial
    /// progress survives a mid-sequence signing failure.
    pub shard_witnesses: Vec<Option<String>>,
    /// Execution token returned by the submit call, polled for confirmation.
    pub submitted: Option<ExecutionHandle>,
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub payload: Payload,
    pub status: WorkItemStatus,
    /// 0-100; never decreases unless the item fails.
    pub progress: u8,
    pub error: Option<String>,
    pub tx_info: TxInfo,
}

/// A partial update merged into a WorkItem. Unset fields leave the current
/// value untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkItemUpdate {
    pub status: Option<WorkItemStatus>,
    pub progress: Option<u8>,
    pub error: Option<String>,
    pub clear_error: bool,
    pub constructed: Option<ExecutionHandle>,
    pub unsigned: Option<UnsignedPayload>,
    pub unsigned_txid: Option<String>,
    pub witness: Option<String>,
    /// Record the witness for one shard by index.
    pub shard_witness: Option<(usize, String)>,
    pub submitted: Option<ExecutionHandle>,
}

impl WorkItem {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            status: WorkItemStatus::Pending,
            progress: 0,
            error: None,
            tx_info: TxInfo::default(),
        }
    }

    /// Merge a partial update. Progress is monotonic while the item has not
    /// failed; a failed item's progress may drop (back to zero).
    pub fn apply(&mut self, update: WorkItemUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            if self.status == WorkItemStatus::Failed {
                self.progress = progress;
            } else {
                self.progress = self.progress.max(progress.min(100));
            }
        }
        if update.clear_error {
            self.error = None;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(constructed) = update.constructed {
            self.tx_info.constructed = Some(constructed);
        }
        if let Some(unsigned) = update.unsigned {
            if let UnsignedPayload::Inscription(tx) = &unsigned {
                self.tx_info
                    .shard_witnesses
                    .resize(tx.shard_txs.len(), None);
            }
            self.tx_info.unsigned = Some(unsigned);
        }
        if let Some(txid) = update.unsigned_txid {
            self.tx_info.unsigned_txid = Some(txid);
        }
        if let Some(witness) = update.witness {
            self.tx_info.witness = Some(witness);
        }
        if let Some((index, witness)) = update.shard_witness {
            if index >= self.tx_info.shard_witnesses.len() {
                self.tx_info.shard_witnesses.resize(index + 1, None);
            }
            self.tx_info.shard_witnesses[index] = Some(witness);
        }
        if let Some(submitted) = update.submitted {
            self.tx_info.submitted = Some(submitted);
        }
    }
}
