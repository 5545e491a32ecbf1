// Scripted wallet implementations for tests. Compiled unconditionally so
// integration tests can drive the orchestrator without a real wallet.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::wallet::capability::{WalletCapability, WalletConnector, WalletError};

/// A wallet whose signing outcomes are scripted ahead of time. Address and
/// UTXO queries answer from fixed state; every signing call consumes the next
/// queued result (defaulting to success once the queue is empty).
#[derive(Debug)]
pub struct MockWallet {
    utxos: Mutex<Vec<String>>,
    reward_addresses: Mutex<Vec<String>>,
    used_addresses: Mutex<Vec<String>>,
    sign_results: Mutex<VecDeque<Result<String, WalletError>>>,
    signed_payloads: Mutex<Vec<String>>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self {
            utxos: Mutex::new(vec!["utxo-0".to_string()]),
            reward_addresses: Mutex::new(vec!["stake-addr-0".to_string()]),
            used_addresses: Mutex::new(vec!["addr-0".to_string()]),
            sign_results: Mutex::new(VecDeque::new()),
            signed_payloads: Mutex::new(Vec::new()),
        }
    }
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_utxos(&self, utxos: Vec<String>) {
        *self.utxos.lock().unwrap() = utxos;
    }

    pub fn set_used_addresses(&self, addresses: Vec<String>) {
        *self.used_addresses.lock().unwrap() = addresses;
    }

    /// Queue a successful signing result.
    pub fn queue_witness(&self, witness: impl Into<String>) {
        self.sign_results
            .lock()
            .unwrap()
            .push_back(Ok(witness.into()));
    }

    /// Queue a user rejection for the next signing call.
    pub fn queue_rejection(&self, info: impl Into<String>) {
        self.sign_results
            .lock()
            .unwrap()
            .push_back(Err(WalletError::SignRejected { info: info.into() }));
    }

    /// Queue a non-rejection wallet failure.
    pub fn queue_failure(&self, message: impl Into<String>) {
        self.sign_results
            .lock()
            .unwrap()
            .push_back(Err(WalletError::Api(message.into())));
    }

    /// Hex payloads this wallet was asked to sign, in order.
    pub fn signed_payloads(&self) -> Vec<String> {
        self.signed_payloads.lock().unwrap().clone()
    }

    pub fn sign_call_count(&self) -> usize {
        self.signed_payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletCapability for MockWallet {
    async fn get_utxos(&self) -> Result<Vec<String>, WalletError> {
        Ok(self.utxos.lock().unwrap().clone())
    }

    async fn get_reward_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(self.reward_addresses.lock().unwrap().clone())
    }

    async fn get_used_addresses(&self) -> Result<Vec<String>, WalletError> {
        Ok(self.used_addresses.lock().unwrap().clone())
    }

    async fn sign_tx(&self, tx_hex: &str) -> Result<String, WalletError> {
        self.signed_payloads.lock().unwrap().push(tx_hex.to_string());
        match self.sign_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(format!("witness-{}", self.sign_call_count())),
        }
    }
}

/// Connector handing out the same scripted wallet while counting how many
/// fresh handles were requested, so tests can assert the refetch-per-sign
/// discipline.
#[derive(Debug)]
pub struct MockConnector {
    wallet: Arc<MockWallet>,
    fetches: AtomicUsize,
}

impl MockConnector {
    pub fn new(wallet: Arc<MockWallet>) -> Self {
        Self {
            wallet,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn wallet(&self) -> &Arc<MockWallet> {
        &self.wallet
    }
}

#[async_trait]
impl WalletConnector for MockConnector {
    async fn wallet_api(&self, _wallet: &str) -> Result<Arc<dyn WalletCapability>, WalletError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.wallet) as Arc<dyn WalletCapability>)
    }
}
