//! Transfer submission
//!
//! [`TransferSubmitter`] reads recipient, amount and contract from the form,
//! builds an ERC20 `transfer` call and hands it to the connected signer. The
//! form lock is only taken between awaits.

use crate::config::Config;
use crate::error::{kind, Result, TokenSendError};
use crate::form::{lock_form, SharedForm};
use crate::types::{TransactionId, TransactionStatus, TransferCall};
use crate::units;
use crate::wallet::{ChainClient, WalletConnector};
use alloy::primitives::Address;
use tracing::{debug, info, warn};

/// Gas price times gas limit, scaled down by 1e9
///
/// This is a rough heuristic with no relation to block times; callers label
/// it as such.
///
/// # Examples
///
/// ```
/// use tokensend::submitter::estimate_confirmation_seconds;
///
/// // 1 gwei at 60k gas
/// assert_eq!(estimate_confirmation_seconds(1_000_000_000, 60_000), 60_000.0);
/// ```
pub fn estimate_confirmation_seconds(gas_price: u128, gas_limit: u64) -> f64 {
    gas_price as f64 * gas_limit as f64 / 1e9
}

/// Parse a user-typed address
pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TokenSendError::InvalidAddress(format!("{} is empty", field)).into());
    }
    value.parse::<Address>().map_err(|e| {
        TokenSendError::InvalidAddress(format!("{} {}: {}", field, value, e)).into()
    })
}

/// Builds and sends ERC20 transfers
#[derive(Debug, Clone)]
pub struct TransferSubmitter {
    decimals: u8,
    estimate_enabled: bool,
}

impl Default for TransferSubmitter {
    fn default() -> Self {
        Self::new(units::DEFAULT_DECIMALS, true)
    }
}

impl TransferSubmitter {
    pub fn new(decimals: u8, estimate_enabled: bool) -> Self {
        Self {
            decimals,
            estimate_enabled,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.token.decimals, config.estimate.enabled)
    }

    /// Token decimals used to convert the typed amount
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Validate the form fields and build the transfer call
    ///
    /// # Errors
    ///
    /// `InvalidAmount` or `InvalidAddress` for unusable input
    pub fn build_call(&self, recipient: &str, amount: &str, contract: &str) -> Result<TransferCall> {
        let value = units::parse_amount(amount, self.decimals)?;
        let to = parse_address("recipient", recipient)?;
        let contract = parse_address("contract", contract)?;
        Ok(TransferCall {
            contract,
            to,
            value,
        })
    }

    /// Submit a transfer of the form's amount to the form's recipient
    ///
    /// On acceptance the returned hash is already persisted and the status is
    /// `Pending`. A rejected submission records the failure in the form and
    /// sets status `Error`, unless an earlier transaction is still in flight,
    /// in which case its status is left alone.
    ///
    /// # Errors
    ///
    /// - `NotConnected` without a signing context
    /// - `InvalidAmount` / `InvalidAddress` for unusable input
    /// - `Submission` if the wallet or node refuses the transaction
    pub async fn submit(
        &self,
        connector: &WalletConnector,
        form: &SharedForm,
    ) -> Result<TransactionId> {
        let signer = connector.signer()?;

        let call = {
            let form = lock_form(form);
            self.build_call(
                form.recipient_address(),
                form.token_amount(),
                form.contract_address(),
            )?
        };

        let amount = units::format_amount(call.value, self.decimals)?;
        debug!(
            from = %signer.address(),
            to = %call.to,
            contract = %call.contract,
            amount = %amount,
            base_units = %call.value,
            "Submitting transfer"
        );

        // While an earlier hash is in flight the status belongs to it
        let in_flight = {
            let mut form = lock_form(form);
            let in_flight = form.transaction_hash().is_some();
            if !in_flight {
                form.set_status(Some(TransactionStatus::Pending));
            }
            form.set_error(None);
            in_flight
        };

        let id = match signer.send_transfer(&call).await {
            Ok(id) => id,
            Err(e) => {
                let err = as_submission_error(e);
                warn!("Transfer rejected: {}", err);
                let mut form = lock_form(form);
                if !in_flight {
                    form.set_status(Some(TransactionStatus::Error));
                }
                form.set_error(Some(err.to_string()));
                return Err(err);
            }
        };

        lock_form(form).begin_transaction(id.clone())?;
        info!(hash = %id, "Transfer submitted");

        if self.estimate_enabled {
            if let Some(chain) = connector.chain() {
                self.record_estimate(chain.as_ref(), &id, form).await;
            }
        }

        Ok(id)
    }

    async fn record_estimate(
        &self,
        chain: &dyn ChainClient,
        id: &TransactionId,
        form: &SharedForm,
    ) {
        let estimate = async {
            let gas_price = chain.gas_price().await?;
            let tx = chain.transaction(id).await?;
            Ok::<_, anyhow::Error>(
                tx.map(|tx| estimate_confirmation_seconds(gas_price, tx.gas_limit)),
            )
        }
        .await;

        match estimate {
            Ok(Some(seconds)) => {
                let mut form = lock_form(form);
                // A fast poller may already have finished this transaction
                if form.transaction_hash() != Some(id) {
                    return;
                }
                if let Err(e) = form.set_estimated_seconds(Some(seconds)) {
                    warn!("Could not store estimate: {}", e);
                }
            }
            Ok(None) => debug!(hash = %id, "Transaction not visible yet; no estimate"),
            Err(e) => warn!(hash = %id, "Estimate unavailable: {}", e),
        }
    }
}

fn as_submission_error(err: anyhow::Error) -> anyhow::Error {
    match kind(&err) {
        Some(TokenSendError::Submission(_)) | Some(TokenSendError::UserRejected(_)) => err,
        _ => TokenSendError::Submission(err.to_string()).into(),
    }
}
