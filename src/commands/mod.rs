/*!
Command handlers for the CLI

Each handler opens the field store, builds a [`TransferSession`] around the
configured wallet and performs one user action:

- `status`: Print the saved form and the last transfer
- `connect`: Ask the wallet for an account
- `set`: Edit the saved form
- `send`: Submit a transfer and, by default, wait for its receipt
- `watch`: Resume polling the saved in-flight transaction
- `clear`: Forget everything
*/

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::display;
use crate::error::{Result, TokenSendError};
use crate::poller::PollSnapshot;
use crate::session::TransferSession;
use crate::storage::{FieldStore, SledFieldStore};
use crate::types::TransactionStatus;
use crate::wallet::local::LocalWalletProvider;
use crate::wallet::WalletProvider;
use colored::Colorize;
use std::sync::Arc;

/// Edits requested on the command line; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct FieldEdits {
    pub recipient: Option<String>,
    pub amount: Option<String>,
    pub contract: Option<String>,
}

impl FieldEdits {
    fn is_empty(&self) -> bool {
        self.recipient.is_none() && self.amount.is_none() && self.contract.is_none()
    }

    fn apply(&self, session: &TransferSession) -> Result<()> {
        if let Some(recipient) = &self.recipient {
            session.set_recipient_address(recipient)?;
        }
        if let Some(amount) = &self.amount {
            session.set_token_amount(amount)?;
        }
        if let Some(contract) = &self.contract {
            session.set_contract_address(contract)?;
        }
        Ok(())
    }
}

/// Open the session described by `config`
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the wallet keys are
/// malformed
pub fn open_session(config: &Config) -> Result<TransferSession> {
    let store: Arc<dyn FieldStore> =
        Arc::new(SledFieldStore::open_or_default(config.storage.path.as_deref())?);

    let provider = LocalWalletProvider::from_config(&config.wallet)?
        .map(|wallet| Arc::new(wallet) as Arc<dyn WalletProvider>);
    if provider.is_none() {
        tracing::debug!(
            var = %config.wallet.private_key_env,
            "No wallet keys configured"
        );
    }

    TransferSession::open(provider, store, config)
}

/// Dispatch the parsed command
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let session = open_session(&config)?;

    match cli.command {
        Commands::Status => status(&session),
        Commands::Connect => connect(&session).await,
        Commands::Set {
            recipient,
            amount,
            contract,
        } => set(
            &session,
            FieldEdits {
                recipient,
                amount,
                contract,
            },
        ),
        Commands::Send {
            recipient,
            amount,
            contract,
            no_wait,
        } => {
            send(
                &session,
                FieldEdits {
                    recipient,
                    amount,
                    contract,
                },
                !no_wait,
            )
            .await
        }
        Commands::Watch => watch(&session).await,
        Commands::Clear => clear(&session),
    }
}

/// Print the saved form and the last transfer
pub fn status(session: &TransferSession) -> Result<()> {
    println!("{}", display::render_session(&session.view()));
    Ok(())
}

/// Connect the wallet
pub async fn connect(session: &TransferSession) -> Result<()> {
    let address = session.connect().await?;
    println!("{}", format!("Connected as {}", address).green());
    Ok(())
}

/// Edit the saved form
pub fn set(session: &TransferSession, edits: FieldEdits) -> Result<()> {
    if edits.is_empty() {
        println!("{}", "Nothing to change.".yellow());
    }
    edits.apply(session)?;
    status(session)
}

/// Submit the saved transfer, optionally waiting for its receipt
pub async fn send(session: &TransferSession, edits: FieldEdits, wait: bool) -> Result<()> {
    edits.apply(session)?;

    if let Some(hash) = session.fields().transaction_hash {
        println!(
            "{}",
            format!("Transaction {} is still pending; it will no longer be watched.", hash)
                .yellow()
        );
    }

    session.connect().await?;
    let hash = session.submit().await?;
    println!("{} {}", "Submitted".green(), hash.as_str().cyan());

    if let Some(seconds) = session.fields().estimated_seconds {
        println!("Estimated confirmation: {}", display::estimate_label(seconds));
    }

    if wait {
        follow(session).await
    } else {
        println!("Run {} to follow it.", "tokensend watch".cyan());
        Ok(())
    }
}

/// Follow the saved in-flight transaction until it settles
pub async fn watch(session: &TransferSession) -> Result<()> {
    let Some(hash) = session.fields().transaction_hash else {
        println!("{}", "No pending transaction.".yellow());
        return status(session);
    };
    if session.poller().is_none() {
        return Err(TokenSendError::NoWallet.into());
    }

    println!("Watching {}", hash.as_str().cyan());
    follow(session).await
}

/// Forget every saved field
pub fn clear(session: &TransferSession) -> Result<()> {
    session.clear()?;
    println!("{}", "Cleared saved fields.".green());
    Ok(())
}

async fn follow(session: &TransferSession) -> Result<()> {
    let Some(poller) = session.poller() else {
        return Err(TokenSendError::NoWallet.into());
    };

    let mut rx = poller.subscribe();
    let mut printed = 0;
    let last: PollSnapshot = loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.attempts > printed {
            printed = snapshot.attempts;
            println!("{}", display::render_snapshot(&snapshot));
        }
        if snapshot.is_settled() {
            break snapshot;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break poller.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                println!(
                    "\n{}",
                    "Stopped watching; the transaction is saved for `tokensend watch`.".yellow()
                );
                return Ok(());
            }
        }
    };

    println!();
    status(session)?;

    match last.status {
        Some(TransactionStatus::Confirmed) => Ok(()),
        Some(status) if status.is_terminal() => Err(anyhow::anyhow!(
            "Transfer ended with status {}: {}",
            status,
            last.error.unwrap_or_default()
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFieldStore;
    use crate::wallet::fake::{FakeWallet, ReceiptStep};
    use crate::types::TransactionId;
    use alloy::primitives::Address;

    const RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";
    const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

    fn session(wallet: &Arc<FakeWallet>) -> TransferSession {
        TransferSession::open(
            Some(wallet.clone()),
            Arc::new(MemoryFieldStore::new()),
            &Config::default(),
        )
        .unwrap()
    }

    fn edits() -> FieldEdits {
        FieldEdits {
            recipient: Some(RECIPIENT.to_string()),
            amount: Some("2".to_string()),
            contract: Some(CONTRACT.to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_waits_for_confirmation() {
        let wallet = FakeWallet::new(vec![Address::repeat_byte(1)]);
        let hash = TransactionId::new("0xabc");
        wallet.queue_hash(hash.clone());
        wallet.script_receipts(&hash, vec![ReceiptStep::NotFound, ReceiptStep::Success]);
        let session = session(&wallet);

        send(&session, edits(), true).await.unwrap();

        assert_eq!(
            session.fields().transaction_status,
            Some(TransactionStatus::Confirmed)
        );
        assert_eq!(wallet.receipt_lookups(&hash), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_reports_failed_transfer() {
        let wallet = FakeWallet::new(vec![Address::repeat_byte(1)]);
        let hash = TransactionId::new("0xabc");
        wallet.queue_hash(hash.clone());
        wallet.script_receipts(&hash, vec![ReceiptStep::Failure]);
        let session = session(&wallet);

        let err = send(&session, edits(), true).await.unwrap_err();
        assert!(err.to_string().contains("Transaction failed"));
    }

    #[tokio::test]
    async fn test_send_without_wait_keeps_hash() {
        let wallet = FakeWallet::new(vec![Address::repeat_byte(1)]);
        let session = session(&wallet);

        send(&session, edits(), false).await.unwrap();
        assert!(session.fields().transaction_hash.is_some());
        assert_eq!(wallet.sent_transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_without_pending_transaction() {
        let wallet = FakeWallet::new(vec![]);
        let session = session(&wallet);
        assert!(watch(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_updates_fields() {
        let wallet = FakeWallet::new(vec![]);
        let session = session(&wallet);

        set(&session, edits()).unwrap();
        let fields = session.fields();
        assert_eq!(fields.recipient_address, RECIPIENT);
        assert_eq!(fields.token_amount, "2");
        assert_eq!(fields.contract_address, CONTRACT);
    }
}
