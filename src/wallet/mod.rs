//! Wallet abstraction for tokensend
//!
//! The transfer flow never talks to a node or a key directly. It goes
//! through three capabilities:
//!
//! - [`WalletProvider`] -- authorizes accounts, hands out signers and pushes
//!   account-change notifications.
//! - [`TransactionSigner`] -- bound to one account; signs and broadcasts the
//!   token transfer.
//! - [`ChainClient`] -- read-only queries: gas price, receipts, transactions.
//!
//! Implementations:
//!
//! - [`local::LocalWalletProvider`] -- private keys from the environment and
//!   a JSON-RPC node, via alloy.
//! - [`fake::FakeWallet`] -- in-process wallet with scripted receipts, used
//!   by tests.

pub mod connector;
pub mod events;
pub mod fake;
pub mod local;

pub use connector::WalletConnector;
pub use events::{AccountsChangedHub, AccountsHandler, Subscription};

use crate::error::Result;
use crate::types::{Receipt, TransactionId, TransactionInfo, TransferCall};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of authorized accounts and signers
#[async_trait]
pub trait WalletProvider: Send + Sync + std::fmt::Debug {
    /// Ask the wallet to authorize its accounts; the first entry is the
    /// active one
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::TokenSendError::UserRejected`] if the request
    /// is declined.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// Signer bound to `account`
    fn signer(&self, account: Address) -> Result<Arc<dyn TransactionSigner>>;

    /// Read-only chain access through the same node
    fn chain(&self) -> Arc<dyn ChainClient>;

    /// Register for account-change notifications
    fn on_accounts_changed(&self, handler: AccountsHandler) -> Subscription;
}

/// Capability bound to one account that can authorize transactions
#[async_trait]
pub trait TransactionSigner: Send + Sync + std::fmt::Debug {
    /// Account this signer signs for
    fn address(&self) -> Address;

    /// Sign and broadcast an ERC20 transfer, returning once the node has
    /// accepted it
    async fn send_transfer(&self, call: &TransferCall) -> Result<TransactionId>;
}

/// Read-only blockchain queries
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Current gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Receipt of `id`, or `None` while it is not yet included
    async fn transaction_receipt(&self, id: &TransactionId) -> Result<Option<Receipt>>;

    /// Broadcast transaction `id`, or `None` if the node does not know it
    async fn transaction(&self, id: &TransactionId) -> Result<Option<TransactionInfo>>;
}
