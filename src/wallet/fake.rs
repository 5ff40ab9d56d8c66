//! In-process fake wallet for unit and integration tests
//!
//! [`FakeWallet`] implements [`WalletProvider`], hands out signers that
//! record every transfer instead of broadcasting it, and answers receipt
//! lookups from a per-transaction script. Nothing touches the network.
//!
//! # Example
//!
//! ```
//! use alloy::primitives::Address;
//! use tokensend::types::TransactionId;
//! use tokensend::wallet::fake::{FakeWallet, ReceiptStep};
//! use tokensend::wallet::WalletProvider;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let wallet = FakeWallet::new(vec![Address::repeat_byte(1)]);
//! let id = TransactionId::new("0x123");
//! wallet.script_receipts(&id, vec![ReceiptStep::NotFound, ReceiptStep::Success]);
//!
//! let chain = wallet.chain();
//! assert!(chain.transaction_receipt(&id).await.unwrap().is_none());
//! assert!(chain.transaction_receipt(&id).await.unwrap().unwrap().success);
//! # }
//! ```

use crate::error::{Result, TokenSendError};
use crate::types::{Receipt, TransactionId, TransactionInfo, TransferCall};
use crate::wallet::{
    AccountsChangedHub, AccountsHandler, ChainClient, Subscription, TransactionSigner,
    WalletProvider,
};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One scripted answer to a receipt lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStep {
    /// Not yet included
    NotFound,
    /// Included, status 1
    Success,
    /// Included, status 0
    Failure,
    /// The lookup itself fails with this message
    LookupError(String),
}

#[derive(Debug)]
struct FakeState {
    accounts: Vec<Address>,
    reject_requests: bool,
    send_error: Option<String>,
    next_hashes: VecDeque<TransactionId>,
    hash_counter: u64,
    receipts: HashMap<TransactionId, VecDeque<ReceiptStep>>,
    lookups: HashMap<TransactionId, usize>,
    sent: Vec<(Address, TransferCall)>,
    gas_price: u128,
    gas_limit: u64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            reject_requests: false,
            send_error: None,
            next_hashes: VecDeque::new(),
            hash_counter: 0,
            receipts: HashMap::new(),
            lookups: HashMap::new(),
            sent: Vec::new(),
            gas_price: 1_000_000_000,
            gas_limit: 60_000,
        }
    }
}

type SharedState = Arc<Mutex<FakeState>>;

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scriptable in-memory wallet
#[derive(Debug)]
pub struct FakeWallet {
    state: SharedState,
    hub: AccountsChangedHub,
}

impl FakeWallet {
    /// Create a wallet exposing `accounts`
    pub fn new(accounts: Vec<Address>) -> Arc<Self> {
        let state = FakeState {
            accounts,
            ..Default::default()
        };
        Arc::new(Self {
            state: Arc::new(Mutex::new(state)),
            hub: AccountsChangedHub::new(),
        })
    }

    /// Make `request_accounts` fail with `UserRejected`
    pub fn reject_requests(&self, reject: bool) {
        lock(&self.state).reject_requests = reject;
    }

    /// Make every transfer fail with `message` (or succeed again with `None`)
    pub fn fail_sends(&self, message: Option<&str>) {
        lock(&self.state).send_error = message.map(str::to_string);
    }

    /// Hash returned by the next accepted transfer
    pub fn queue_hash(&self, id: TransactionId) {
        lock(&self.state).next_hashes.push_back(id);
    }

    /// Answers for successive receipt lookups of `id`; the last step repeats
    pub fn script_receipts(&self, id: &TransactionId, steps: Vec<ReceiptStep>) {
        lock(&self.state)
            .receipts
            .insert(id.clone(), steps.into_iter().collect());
    }

    /// Gas values reported for the time estimate
    pub fn set_gas(&self, gas_price: u128, gas_limit: u64) {
        let mut state = lock(&self.state);
        state.gas_price = gas_price;
        state.gas_limit = gas_limit;
    }

    /// Replace the account set and notify subscribers, like a wallet
    /// extension switching or locking accounts
    pub fn set_accounts(&self, accounts: Vec<Address>) {
        lock(&self.state).accounts = accounts.clone();
        self.hub.emit(&accounts);
    }

    /// Transfers signed so far, with the signing account
    pub fn sent_transfers(&self) -> Vec<(Address, TransferCall)> {
        lock(&self.state).sent.clone()
    }

    /// Number of receipt lookups made for `id`
    pub fn receipt_lookups(&self, id: &TransactionId) -> usize {
        lock(&self.state).lookups.get(id).copied().unwrap_or(0)
    }

    /// Number of live account-change subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let state = lock(&self.state);
        if state.reject_requests {
            return Err(TokenSendError::UserRejected("User rejected the request".to_string()).into());
        }
        Ok(state.accounts.clone())
    }

    fn signer(&self, account: Address) -> Result<Arc<dyn TransactionSigner>> {
        if !lock(&self.state).accounts.contains(&account) {
            return Err(
                TokenSendError::UserRejected(format!("account {} is not authorized", account))
                    .into(),
            );
        }
        Ok(Arc::new(FakeSigner {
            address: account,
            state: Arc::clone(&self.state),
        }))
    }

    fn chain(&self) -> Arc<dyn ChainClient> {
        Arc::new(FakeChain {
            state: Arc::clone(&self.state),
        })
    }

    fn on_accounts_changed(&self, handler: AccountsHandler) -> Subscription {
        self.hub.subscribe(handler)
    }
}

#[derive(Debug)]
struct FakeSigner {
    address: Address,
    state: SharedState,
}

#[async_trait]
impl TransactionSigner for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transfer(&self, call: &TransferCall) -> Result<TransactionId> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.send_error {
            return Err(TokenSendError::Submission(message.clone()).into());
        }

        state.sent.push((self.address, call.clone()));
        let id = match state.next_hashes.pop_front() {
            Some(id) => id,
            None => {
                state.hash_counter += 1;
                TransactionId::new(format!("0x{:064x}", state.hash_counter))
            }
        };
        Ok(id)
    }
}

#[derive(Debug)]
struct FakeChain {
    state: SharedState,
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn gas_price(&self) -> Result<u128> {
        Ok(lock(&self.state).gas_price)
    }

    async fn transaction_receipt(&self, id: &TransactionId) -> Result<Option<Receipt>> {
        let mut state = lock(&self.state);
        *state.lookups.entry(id.clone()).or_insert(0) += 1;

        let step = match state.receipts.get_mut(id) {
            Some(steps) if steps.len() > 1 => steps.pop_front(),
            Some(steps) => steps.front().cloned(),
            None => None,
        };

        match step.unwrap_or(ReceiptStep::NotFound) {
            ReceiptStep::NotFound => Ok(None),
            ReceiptStep::Success => Ok(Some(Receipt {
                success: true,
                block_number: Some(1),
                gas_used: 21_000,
            })),
            ReceiptStep::Failure => Ok(Some(Receipt {
                success: false,
                block_number: Some(1),
                gas_used: 21_000,
            })),
            ReceiptStep::LookupError(message) => {
                Err(TokenSendError::ReceiptLookup(message).into())
            }
        }
    }

    async fn transaction(&self, id: &TransactionId) -> Result<Option<TransactionInfo>> {
        let state = lock(&self.state);
        let known = !state.sent.is_empty() || state.receipts.contains_key(id);
        Ok(known.then_some(TransactionInfo {
            gas_limit: state.gas_limit,
        }))
    }
}
