// The wallet seam. A wallet is an external capability the host injects; the
// pipeline only ever sees these traits.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a wallet capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    /// The user declined the signing prompt, or the wallet itself reported a
    /// signing failure. Recoverable: the same payload may be re-signed.
    #[error("{info}")]
    SignRejected { info: String },
    /// Any other wallet-side failure (not enabled, internal error, ...).
    #[error("{0}")]
    Api(String),
}

/// The capability surface the pipeline consumes from a connected wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletCapability: Send + Sync {
    async fn get_utxos(&self) -> Result<Vec<String>, WalletError>;
    async fn get_reward_addresses(&self) -> Result<Vec<String>, WalletError>;
    async fn get_used_addresses(&self) -> Result<Vec<String>, WalletError>;
    /// Sign a hex-encoded transaction payload, returning the witness. A user
    /// rejection must map to [`WalletError::SignRejected`].
    async fn sign_tx(&self, tx_hex: &str) -> Result<String, WalletError>;
}

/// Yields wallet capability handles by wallet name.
///
/// Callers must request a fresh handle before every signing attempt; a stale
/// handle can fail to re-trigger the wallet's approval prompt.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn wallet_api(&self, wallet: &str) -> Result<Arc<dyn WalletCapability>, WalletError>;
}
