// SigningCoordinator: exactly one wallet signing call per invocation, with
// the outcome split into the two classes the orchestrator cares about.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::wallet::capability::{WalletConnector, WalletError};

/// Outcome classification for a single signing attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SigningError {
    /// The user rejected the prompt or the wallet reported a signing
    /// failure. The caller must keep all prior progress and allow a retry of
    /// the exact same call.
    #[error("Wallet signing error: {info}")]
    Wallet { info: String },
    /// Anything else: non-recoverable for the current attempt.
    #[error("failed to sign transaction: {0}")]
    Other(String),
}

impl SigningError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SigningError::Wallet { .. })
    }
}

/// Wraps wallet signing. Holds no signing state of its own and mutates
/// nothing on the caller's behalf; interpreting the result is the caller's
/// job.
pub struct SigningCoordinator {
    connector: Arc<dyn WalletConnector>,
}

impl SigningCoordinator {
    pub fn new(connector: Arc<dyn WalletConnector>) -> Self {
        Self { connector }
    }

    /// Fetch a fresh capability handle for `wallet` and sign one hex-encoded
    /// payload. The handle is never cached across calls so the wallet's
    /// approval prompt re-appears on every retry.
    pub async fn sign_payload(&self, wallet: &str, tx_hex: &str) -> Result<String, SigningError> {
        let api = self
            .connector
            .wallet_api(wallet)
            .await
            .map_err(|e| SigningError::Other(e.to_string()))?;

        match api.sign_tx(tx_hex).await {
            Ok(witness) => {
                debug!(wallet = %wallet, "transaction signed");
                Ok(witness)
            }
            Err(WalletError::SignRejected { info }) => {
                warn!(wallet = %wallet, info = %info, "wallet rejected signing");
                Err(SigningError::Wallet { info })
            }
            Err(other) => Err(SigningError::Other(other.to_string())),
        }
    }
}
