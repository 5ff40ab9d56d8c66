//! Wallet connection state
//!
//! [`WalletConnector`] turns an injected [`WalletProvider`] into an active
//! signing context. It follows the wallet's account-change notifications:
//! an empty account set drops the signing context, so every later signing
//! attempt fails with `NotConnected` until `connect` is called again.

use crate::error::{Result, TokenSendError};
use crate::wallet::{AccountsHandler, ChainClient, Subscription, TransactionSigner, WalletProvider};
use alloy::primitives::Address;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ConnectionState {
    address: Option<Address>,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl ConnectionState {
    fn clear(&mut self) {
        self.address = None;
        self.signer = None;
    }
}

fn lock(state: &Mutex<ConnectionState>) -> MutexGuard<'_, ConnectionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the active account and signer for the session
///
/// # Examples
///
/// ```
/// use tokensend::error::{kind, TokenSendError};
/// use tokensend::wallet::WalletConnector;
///
/// # #[tokio::main]
/// # async fn main() {
/// let connector = WalletConnector::new(None);
/// let err = connector.connect().await.unwrap_err();
/// assert!(matches!(kind(&err), Some(TokenSendError::NoWallet)));
/// assert!(!connector.is_connected());
/// # }
/// ```
#[derive(Debug)]
pub struct WalletConnector {
    provider: Option<Arc<dyn WalletProvider>>,
    state: Arc<Mutex<ConnectionState>>,
    _accounts: Option<Subscription>,
}

impl WalletConnector {
    /// Create a connector; `None` means no wallet is available
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let state = Arc::new(Mutex::new(ConnectionState::default()));

        let subscription = provider.as_ref().map(|provider| {
            let handler = accounts_handler(Arc::downgrade(provider), Arc::downgrade(&state));
            provider.on_accounts_changed(handler)
        });

        Self {
            provider,
            state,
            _accounts: subscription,
        }
    }

    /// True when a wallet provider was injected
    pub fn has_wallet(&self) -> bool {
        self.provider.is_some()
    }

    /// Request account access and bind a signer to the first account
    ///
    /// # Errors
    ///
    /// Returns `TokenSendError::NoWallet` without a provider, and
    /// `TokenSendError::UserRejected` if the wallet declines or offers no
    /// account.
    pub async fn connect(&self) -> Result<Address> {
        let provider = self.provider.as_ref().ok_or(TokenSendError::NoWallet)?;

        let accounts = provider.request_accounts().await?;
        let address = *accounts.first().ok_or_else(|| {
            TokenSendError::UserRejected("wallet returned no accounts".to_string())
        })?;

        let signer = provider.signer(address)?;

        let mut state = lock(&self.state);
        state.address = Some(address);
        state.signer = Some(signer);

        info!(%address, "Wallet connected");
        Ok(address)
    }

    /// Drop the signing context
    pub fn disconnect(&self) {
        lock(&self.state).clear();
        debug!("Wallet disconnected");
    }

    /// Active account, if connected
    pub fn address(&self) -> Option<Address> {
        lock(&self.state).address
    }

    /// True while a signing context is held
    pub fn is_connected(&self) -> bool {
        lock(&self.state).signer.is_some()
    }

    /// Signer for the active account
    ///
    /// # Errors
    ///
    /// Returns `TokenSendError::NotConnected` if there is no signing context
    pub fn signer(&self) -> Result<Arc<dyn TransactionSigner>> {
        lock(&self.state)
            .signer
            .clone()
            .ok_or_else(|| TokenSendError::NotConnected.into())
    }

    /// Read-only chain access, available even before connecting
    pub fn chain(&self) -> Option<Arc<dyn ChainClient>> {
        self.provider.as_ref().map(|p| p.chain())
    }

    /// Forward account-change notifications to `handler`
    ///
    /// Returns `None` when no wallet is available.
    pub fn on_accounts_changed(&self, handler: AccountsHandler) -> Option<Subscription> {
        self.provider
            .as_ref()
            .map(|provider| provider.on_accounts_changed(handler))
    }
}

fn accounts_handler(
    provider: Weak<dyn WalletProvider>,
    state: Weak<Mutex<ConnectionState>>,
) -> AccountsHandler {
    Arc::new(move |accounts: &[Address]| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = lock(&state);

        let Some(&first) = accounts.first() else {
            if state.signer.is_some() {
                info!("Wallet reported no accounts; signing context dropped");
            }
            state.clear();
            return;
        };

        // Only follow the wallet while connected; a disconnected session
        // must go through connect() to get a signer.
        if state.signer.is_none() {
            return;
        }

        let Some(provider) = provider.upgrade() else {
            state.clear();
            return;
        };

        match provider.signer(first) {
            Ok(signer) => {
                debug!(address = %first, "Active account changed");
                state.address = Some(first);
                state.signer = Some(signer);
            }
            Err(e) => {
                warn!(address = %first, "Could not bind signer to new account: {}", e);
                state.clear();
            }
        }
    })
}
