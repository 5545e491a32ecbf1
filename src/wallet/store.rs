// Default-wallet persistence port. The host decides where the default wallet
// name lives (browser storage, a config file); the pipeline only needs
// get/set/clear semantics, and tests get an in-memory implementation.

use std::sync::Mutex;

pub trait DefaultWalletStore: Send + Sync {
    fn default_wallet(&self) -> Option<String>;
    fn set_default_wallet(&self, wallet: &str);
    fn clear_default_wallet(&self);
}

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    wallet: Mutex<Option<String>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(wallet: impl Into<String>) -> Self {
        Self {
            wallet: Mutex::new(Some(wallet.into())),
        }
    }
}

impl DefaultWalletStore for InMemoryWalletStore {
    fn default_wallet(&self) -> Option<String> {
        self.wallet.lock().expect("wallet store poisoned").clone()
    }

    fn set_default_wallet(&self, wallet: &str) {
        *self.wallet.lock().expect("wallet store poisoned") = Some(wallet.to_string());
    }

    fn clear_default_wallet(&self) {
        *self.wallet.lock().expect("wallet store poisoned") = None;
    }
}
