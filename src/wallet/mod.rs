pub mod capability;
pub mod mocks;
pub mod signing;
pub mod store;

pub use capability::{WalletCapability, WalletConnector, WalletError};
pub use signing::{SigningCoordinator, SigningError};
pub use store::{DefaultWalletStore, InMemoryWalletStore};
