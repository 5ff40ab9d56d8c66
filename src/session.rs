//! Transfer session
//!
//! [`TransferSession`] wires the connector, the persisted form, the
//! submitter and the poller together and exposes the user actions: connect,
//! edit a field, submit, clear. Every action records its failure in the form
//! so the view can show it.

use crate::config::Config;
use crate::error::Result;
use crate::form::{lock_form, FormState, SessionFields, SharedForm};
use crate::poller::{PollSnapshot, StatusPoller};
use crate::storage::FieldStore;
use crate::submitter::TransferSubmitter;
use crate::types::TransactionId;
use crate::wallet::{AccountsHandler, Subscription, WalletConnector, WalletProvider};
use alloy::primitives::Address;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// What the presentation layer needs to render the session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub fields: SessionFields,
    pub has_wallet: bool,
    pub connected: bool,
    pub can_submit: bool,
    pub polling: bool,
}

/// One user's transfer session
#[derive(Debug)]
pub struct TransferSession {
    connector: Arc<WalletConnector>,
    form: SharedForm,
    submitter: TransferSubmitter,
    poller: Option<StatusPoller>,
    _accounts: Option<Subscription>,
}

impl TransferSession {
    /// Restore the form from `store` and resume polling a stored hash
    ///
    /// Must be called from within a tokio runtime when a wallet is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    pub fn open(
        provider: Option<Arc<dyn WalletProvider>>,
        store: Arc<dyn FieldStore>,
        config: &Config,
    ) -> Result<Self> {
        let form: SharedForm = Arc::new(Mutex::new(FormState::restore(store)?));
        let connector = Arc::new(WalletConnector::new(provider));

        let accounts = connector.on_accounts_changed(sender_handler(
            Arc::downgrade(&connector),
            Arc::downgrade(&form),
        ));

        let poller = connector
            .chain()
            .map(|chain| StatusPoller::from_config(chain, Arc::clone(&form), &config.poller));

        let session = Self {
            connector,
            form,
            submitter: TransferSubmitter::from_config(config),
            poller,
            _accounts: accounts,
        };
        session.resume();
        Ok(session)
    }

    /// Start polling the stored transaction, if any
    ///
    /// Returns the hash being polled.
    pub fn resume(&self) -> Option<TransactionId> {
        let hash = lock_form(&self.form).transaction_hash().cloned()?;
        match &self.poller {
            Some(poller) => {
                info!(%hash, "Resuming pending transaction");
                poller.start(hash.clone());
                Some(hash)
            }
            None => {
                debug!(%hash, "Pending transaction but no wallet to poll with");
                None
            }
        }
    }

    /// Connect the wallet and show the account as sender
    pub async fn connect(&self) -> Result<Address> {
        match self.connector.connect().await {
            Ok(address) => {
                let mut form = lock_form(&self.form);
                form.set_sender_address(address.to_string())?;
                form.set_error(None);
                Ok(address)
            }
            Err(e) => {
                warn!("Connect failed: {}", e);
                lock_form(&self.form).set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn set_recipient_address(&self, value: &str) -> Result<()> {
        lock_form(&self.form).set_recipient_address(value)
    }

    pub fn set_token_amount(&self, value: &str) -> Result<()> {
        lock_form(&self.form).set_token_amount(value)
    }

    pub fn set_contract_address(&self, value: &str) -> Result<()> {
        lock_form(&self.form).set_contract_address(value)
    }

    /// Submit the transfer described by the form and start polling it
    pub async fn submit(&self) -> Result<TransactionId> {
        match self.submitter.submit(&self.connector, &self.form).await {
            Ok(hash) => {
                if let Some(poller) = &self.poller {
                    poller.start(hash.clone());
                }
                Ok(hash)
            }
            Err(e) => {
                warn!("Submit failed: {}", e);
                lock_form(&self.form).set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// True when a submit could reach a signer
    pub fn can_submit(&self) -> bool {
        self.connector.is_connected()
    }

    /// Stop polling and forget every stored field
    pub fn clear(&self) -> Result<()> {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
        lock_form(&self.form).clear()
    }

    /// Wait for the current poll to settle
    ///
    /// Returns `None` when nothing is being polled.
    pub async fn wait_for_outcome(&self) -> Option<PollSnapshot> {
        let poller = self.poller.as_ref().filter(|p| p.is_running())?;
        Some(poller.wait_terminal().await)
    }

    pub fn poller(&self) -> Option<&StatusPoller> {
        self.poller.as_ref()
    }

    pub fn connector(&self) -> &WalletConnector {
        &self.connector
    }

    pub fn fields(&self) -> SessionFields {
        lock_form(&self.form).fields().clone()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            fields: self.fields(),
            has_wallet: self.connector.has_wallet(),
            connected: self.connector.is_connected(),
            can_submit: self.can_submit(),
            polling: self.poller.as_ref().is_some_and(StatusPoller::is_running),
        }
    }
}

/// Mirror account changes into the sender field
fn sender_handler(connector: Weak<WalletConnector>, form: Weak<Mutex<FormState>>) -> AccountsHandler {
    Arc::new(move |accounts: &[Address]| {
        let (Some(connector), Some(form)) = (connector.upgrade(), form.upgrade()) else {
            return;
        };

        let sender = if accounts.is_empty() {
            String::new()
        } else {
            match connector.address() {
                Some(address) => address.to_string(),
                None => return,
            }
        };

        let stored = lock_form(&form).set_sender_address(sender);
        if let Err(e) = stored {
            warn!("Could not store sender address: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{kind, TokenSendError};
    use crate::storage::{keys, MemoryFieldStore};
    use crate::types::TransactionStatus;
    use crate::wallet::fake::{FakeWallet, ReceiptStep};

    const RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";
    const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

    fn account(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn open(wallet: &Arc<FakeWallet>, store: &Arc<MemoryFieldStore>) -> TransferSession {
        TransferSession::open(Some(wallet.clone()), store.clone(), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_without_wallet_connect_fails_and_submit_is_disabled() {
        let store = Arc::new(MemoryFieldStore::new());
        let session = TransferSession::open(None, store, &Config::default()).unwrap();

        let err = session.connect().await.unwrap_err();
        assert!(matches!(kind(&err), Some(TokenSendError::NoWallet)));

        let view = session.view();
        assert!(!view.has_wallet);
        assert!(!view.connected);
        assert!(!view.can_submit);
        assert_eq!(view.fields.error.as_deref(), Some("No wallet detected"));
    }

    #[tokio::test]
    async fn test_connect_sets_sender() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let session = open(&wallet, &store);

        session.connect().await.unwrap();
        assert_eq!(session.fields().sender_address, account(1).to_string());
        assert!(session.can_submit());
        assert_eq!(
            store.get(keys::SENDER_ADDRESS).unwrap(),
            Some(account(1).to_string())
        );
    }

    #[tokio::test]
    async fn test_emptied_accounts_clear_sender_and_block_submit() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let session = open(&wallet, &store);
        session.connect().await.unwrap();
        session.set_recipient_address(RECIPIENT).unwrap();
        session.set_token_amount("1").unwrap();
        session.set_contract_address(CONTRACT).unwrap();

        wallet.set_accounts(vec![]);

        assert_eq!(session.fields().sender_address, "");
        assert!(!session.can_submit());
        let err = session.submit().await.unwrap_err();
        assert!(matches!(kind(&err), Some(TokenSendError::NotConnected)));
        assert!(wallet.sent_transfers().is_empty());
    }

    #[tokio::test]
    async fn test_account_switch_updates_sender() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let session = open(&wallet, &store);
        session.connect().await.unwrap();

        wallet.set_accounts(vec![account(2)]);
        assert_eq!(session.fields().sender_address, account(2).to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_polls_to_confirmation() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let hash = TransactionId::new("0x123");
        wallet.queue_hash(hash.clone());
        wallet.script_receipts(&hash, vec![ReceiptStep::NotFound, ReceiptStep::Success]);

        let session = open(&wallet, &store);
        session.connect().await.unwrap();
        session.set_recipient_address(RECIPIENT).unwrap();
        session.set_token_amount("1.5").unwrap();
        session.set_contract_address(CONTRACT).unwrap();

        assert_eq!(session.submit().await.unwrap(), hash);
        assert!(session.view().polling);

        let outcome = session.wait_for_outcome().await.unwrap();
        assert_eq!(outcome.status, Some(TransactionStatus::Confirmed));
        assert_eq!(store.get(keys::TRANSACTION_HASH).unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_forgets_everything() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let session = open(&wallet, &store);
        session.set_recipient_address(RECIPIENT).unwrap();

        session.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(session.fields(), SessionFields::default());
    }

    #[tokio::test]
    async fn test_dropping_session_releases_subscriptions() {
        let wallet = FakeWallet::new(vec![account(1)]);
        let store = Arc::new(MemoryFieldStore::new());
        let session = open(&wallet, &store);
        assert_eq!(wallet.subscriber_count(), 2);

        drop(session);
        assert_eq!(wallet.subscriber_count(), 0);
    }
}
