//! tokensend - ERC20 transfer client library
//!
//! This library connects a wallet, keeps a small transfer form persisted on
//! disk, submits ERC20 `transfer` calls and follows the resulting
//! transaction until its receipt shows up.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `wallet`: Wallet provider traits, account-change subscriptions, the
//!   connector, a local-key wallet over JSON-RPC and an in-process fake
//! - `form`: Session fields with write-through persistence
//! - `storage`: Durable key/value field stores
//! - `submitter`: Builds and sends the transfer, records the rough estimate
//! - `poller`: Cancellable receipt polling task
//! - `session`: Wires the pieces together behind the user actions
//! - `display`: Terminal rendering
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokensend::storage::SledFieldStore;
//! use tokensend::wallet::local::LocalWalletProvider;
//! use tokensend::wallet::WalletProvider;
//! use tokensend::{Config, TransferSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let store = Arc::new(SledFieldStore::open_or_default(None)?);
//!     let wallet = LocalWalletProvider::from_config(&config.wallet)?
//!         .map(|w| Arc::new(w) as Arc<dyn WalletProvider>);
//!
//!     let session = TransferSession::open(wallet, store, &config)?;
//!     session.connect().await?;
//!     session.set_recipient_address("0x000000000000000000000000000000000000dEaD")?;
//!     session.set_token_amount("1.5")?;
//!     session.set_contract_address("0x1111111111111111111111111111111111111111")?;
//!     session.submit().await?;
//!     session.wait_for_outcome().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod erc20;
pub mod error;
pub mod form;
pub mod logging;
pub mod poller;
pub mod session;
pub mod storage;
pub mod submitter;
pub mod types;
pub mod units;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TokenSendError};
pub use form::{FormState, SessionFields};
pub use poller::{PollSnapshot, StatusPoller};
pub use session::{SessionView, TransferSession};
pub use submitter::TransferSubmitter;
pub use types::{TransactionId, TransactionStatus};
pub use wallet::WalletConnector;
