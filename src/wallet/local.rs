//! Local-key wallet backed by a JSON-RPC node
//!
//! Private keys are read from the environment variable named by
//! `wallet.private_key_env` (comma-separated for several accounts). When the
//! variable is missing or empty there is no wallet, which the connector
//! reports as `NoWallet`. Signing happens in-process with alloy's
//! `PrivateKeySigner`; the node only sees signed transactions.

use crate::config::WalletConfig;
use crate::erc20;
use crate::error::{Result, TokenSendError};
use crate::types::{Receipt, TransactionId, TransactionInfo, TransferCall};
use crate::wallet::{
    AccountsChangedHub, AccountsHandler, ChainClient, Subscription, TransactionSigner,
    WalletProvider,
};
use alloy::consensus::Transaction as _;
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use url::Url;

/// Wallet holding local private keys
#[derive(Debug)]
pub struct LocalWalletProvider {
    rpc_url: Url,
    keys: Vec<PrivateKeySigner>,
    active: Mutex<Option<usize>>,
    auto_approve: bool,
    hub: AccountsChangedHub,
    chain: Arc<RpcChainClient>,
}

impl LocalWalletProvider {
    /// Build the wallet from configuration and the key environment variable
    ///
    /// Returns `Ok(None)` when no key is configured.
    ///
    /// # Errors
    ///
    /// Returns `TokenSendError::Config` for an invalid RPC URL or key
    pub fn from_config(config: &WalletConfig) -> Result<Option<Self>> {
        let raw = match std::env::var(&config.private_key_env) {
            Ok(raw) if !raw.trim().is_empty() => raw,
            _ => {
                debug!(var = %config.private_key_env, "No private key configured");
                return Ok(None);
            }
        };

        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| {
                k.parse::<PrivateKeySigner>().map_err(|e| {
                    TokenSendError::Config(format!(
                        "{} contains an invalid private key: {}",
                        config.private_key_env, e
                    ))
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Self::new(&config.rpc_url, keys, config.auto_approve).map(Some)
    }

    /// Build the wallet from explicit keys
    pub fn new(rpc_url: &str, keys: Vec<PrivateKeySigner>, auto_approve: bool) -> Result<Self> {
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| TokenSendError::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        let provider = ProviderBuilder::new().connect_http(rpc_url.clone()).erased();

        Ok(Self {
            rpc_url,
            active: Mutex::new((!keys.is_empty()).then_some(0)),
            keys,
            auto_approve,
            hub: AccountsChangedHub::new(),
            chain: Arc::new(RpcChainClient { provider }),
        })
    }

    /// Addresses of every key, in configuration order
    pub fn addresses(&self) -> Vec<Address> {
        self.keys.iter().map(|k| k.address()).collect()
    }

    /// Make the key at `index` the active account and notify subscribers
    pub fn switch_account(&self, index: usize) -> Result<Address> {
        let address = self
            .keys
            .get(index)
            .map(|k| k.address())
            .ok_or_else(|| TokenSendError::Config(format!("No account at index {}", index)))?;

        *self.active_slot() = Some(index);
        info!(%address, "Active account switched");
        self.hub.emit(&self.accounts());
        Ok(address)
    }

    /// Withhold every account and notify subscribers with an empty set
    pub fn lock(&self) {
        *self.active_slot() = None;
        info!("Wallet locked");
        self.hub.emit(&[]);
    }

    /// Authorized accounts, active one first; empty while locked
    fn accounts(&self) -> Vec<Address> {
        let Some(active) = *self.active_slot() else {
            return Vec::new();
        };
        let mut accounts = self.addresses();
        accounts.swap(0, active);
        accounts
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<usize>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn approve(&self, account: Address) -> Result<bool> {
        if self.auto_approve {
            return Ok(true);
        }

        let prompt = format!("Allow tokensend to use account {}? [y/N] ", account);
        let answer = tokio::task::spawn_blocking(move || -> Result<String> {
            let mut rl = rustyline::DefaultEditor::new()
                .map_err(|e| TokenSendError::UserRejected(e.to_string()))?;
            rl.readline(&prompt)
                .map_err(|e| TokenSendError::UserRejected(e.to_string()).into())
        })
        .await??;

        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let accounts = self.accounts();
        let Some(&active) = accounts.first() else {
            return Err(TokenSendError::UserRejected("wallet is locked".to_string()).into());
        };

        if !self.approve(active).await? {
            return Err(
                TokenSendError::UserRejected("account request declined".to_string()).into(),
            );
        }

        Ok(accounts)
    }

    fn signer(&self, account: Address) -> Result<Arc<dyn TransactionSigner>> {
        let key = self
            .keys
            .iter()
            .find(|k| k.address() == account)
            .cloned()
            .ok_or_else(|| {
                TokenSendError::UserRejected(format!("account {} is not in this wallet", account))
            })?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(key))
            .connect_http(self.rpc_url.clone())
            .erased();

        Ok(Arc::new(LocalSigner {
            address: account,
            provider,
        }))
    }

    fn chain(&self) -> Arc<dyn ChainClient> {
        self.chain.clone()
    }

    fn on_accounts_changed(&self, handler: AccountsHandler) -> Subscription {
        self.hub.subscribe(handler)
    }
}

/// Signer for one local key, broadcasting through the node
struct LocalSigner {
    address: Address,
    provider: DynProvider,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transfer(&self, call: &TransferCall) -> Result<TransactionId> {
        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(call.contract)
            .with_input(erc20::transfer_calldata(call));

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| TokenSendError::Submission(e.to_string()))?;

        Ok(TransactionId::from(*pending.tx_hash()))
    }
}

/// Read-only queries against the node
struct RpcChainClient {
    provider: DynProvider,
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient").finish_non_exhaustive()
    }
}

fn parse_hash(id: &TransactionId) -> Result<TxHash> {
    id.as_str().parse::<TxHash>().map_err(|e| {
        TokenSendError::ReceiptLookup(format!("{} is not a transaction hash: {}", id, e)).into()
    })
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn gas_price(&self) -> Result<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| TokenSendError::ReceiptLookup(e.to_string()).into())
    }

    async fn transaction_receipt(&self, id: &TransactionId) -> Result<Option<Receipt>> {
        let hash = parse_hash(id)?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| TokenSendError::ReceiptLookup(e.to_string()))?;

        Ok(receipt.map(|r| Receipt {
            success: r.status(),
            block_number: r.block_number(),
            gas_used: r.gas_used(),
        }))
    }

    async fn transaction(&self, id: &TransactionId) -> Result<Option<TransactionInfo>> {
        let hash = parse_hash(id)?;
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| TokenSendError::ReceiptLookup(e.to_string()))?;

        Ok(tx.map(|tx| TransactionInfo {
            gas_limit: tx.gas_limit(),
        }))
    }
}
