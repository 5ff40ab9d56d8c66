//! Integration tests for the transfer session
//!
//! Drives connect, edit, submit and receipt polling end to end against the
//! in-process fake wallet and a sled field store on disk. Time is paused so
//! the one-second poll interval costs nothing.

mod common;

use alloy::primitives::{Address, U256};
use common::{fill_form, open_session, open_store, CONTRACT, RECIPIENT};
use std::time::Duration;
use tempfile::TempDir;
use tokensend::error::kind;
use tokensend::storage::{keys, FieldStore};
use tokensend::wallet::fake::{FakeWallet, ReceiptStep};
use tokensend::{Config, TokenSendError, TransactionId, TransactionStatus, TransferSession};

fn sender() -> Address {
    Address::repeat_byte(0x11)
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_transfer_removes_stored_hash() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(&dir);
    let wallet = FakeWallet::new(vec![sender()]);
    let hash = TransactionId::new("0x123");
    wallet.queue_hash(hash.clone());
    wallet.script_receipts(&hash, vec![ReceiptStep::NotFound, ReceiptStep::Success]);

    let session = open_session(&wallet, store.clone());
    session.connect().await.expect("connect");
    fill_form(&session, "1.5");

    let submitted = session.submit().await.expect("submit");
    assert_eq!(submitted, hash);
    assert_eq!(
        store.get(keys::TRANSACTION_HASH).unwrap().as_deref(),
        Some("0x123")
    );
    assert_eq!(
        session.fields().transaction_status,
        Some(TransactionStatus::Pending)
    );

    let outcome = session.wait_for_outcome().await.expect("polling");
    assert_eq!(outcome.status, Some(TransactionStatus::Confirmed));
    assert_eq!(store.get(keys::TRANSACTION_HASH).unwrap(), None);
    assert_eq!(store.get(keys::ESTIMATED_TRANSACTION_TIME).unwrap(), None);

    let sent = wallet.sent_transfers();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, sender());
    assert_eq!(sent[0].1.value, U256::from(1_500_000_000_000_000_000u128));
    assert_eq!(sent[0].1.contract, CONTRACT.parse::<Address>().unwrap());
    assert_eq!(sent[0].1.to, RECIPIENT.parse::<Address>().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_failed_transfer_reports_transaction_failed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let wallet = FakeWallet::new(vec![sender()]);
    let hash = TransactionId::new("0x123");
    wallet.queue_hash(hash.clone());
    wallet.script_receipts(&hash, vec![ReceiptStep::Failure]);

    let session = open_session(&wallet, open_store(&dir));
    session.connect().await.expect("connect");
    fill_form(&session, "1");
    session.submit().await.expect("submit");

    let outcome = session.wait_for_outcome().await.expect("polling");
    assert_eq!(outcome.status, Some(TransactionStatus::Failed));

    let fields = session.fields();
    assert_eq!(fields.transaction_status, Some(TransactionStatus::Failed));
    assert_eq!(fields.error.as_deref(), Some("Transaction failed"));
    assert_eq!(fields.transaction_hash, None);
}

#[tokio::test(start_paused = true)]
async fn test_stored_hash_resumes_polling_after_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    {
        let store = open_store(&dir);
        store.set(keys::RECIPIENT_ADDRESS, RECIPIENT).unwrap();
        store.set(keys::TRANSACTION_HASH, "0x123").unwrap();
        store.set(keys::ESTIMATED_TRANSACTION_TIME, "42").unwrap();
    }

    let wallet = FakeWallet::new(vec![sender()]);
    let hash = TransactionId::new("0x123");
    wallet.script_receipts(
        &hash,
        vec![ReceiptStep::NotFound, ReceiptStep::NotFound, ReceiptStep::Success],
    );

    let store = open_store(&dir);
    let session = open_session(&wallet, store.clone());

    let view = session.view();
    assert!(view.polling);
    assert!(!view.connected);
    assert_eq!(view.fields.transaction_status, Some(TransactionStatus::Pending));
    assert_eq!(view.fields.estimated_seconds, Some(42.0));
    assert_eq!(view.fields.recipient_address, RECIPIENT);

    let outcome = session.wait_for_outcome().await.expect("polling");
    assert_eq!(outcome.status, Some(TransactionStatus::Confirmed));

    // Polling stopped exactly once: no lookups after the terminal receipt
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(wallet.receipt_lookups(&hash), 3);
    assert!(!session.view().polling);
    assert_eq!(store.get(keys::TRANSACTION_HASH).unwrap(), None);
}

fn restore_pending(dir: &TempDir, hash: &str) {
    let store = open_store(dir);
    store.set(keys::TRANSACTION_HASH, hash).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_resubmit_leaves_pending_transaction_tracked() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    restore_pending(&dir, "0xaaa");
    let wallet = FakeWallet::new(vec![sender()]);
    let pending = TransactionId::new("0xaaa");
    wallet.script_receipts(
        &pending,
        vec![ReceiptStep::NotFound, ReceiptStep::NotFound, ReceiptStep::Success],
    );

    let session = open_session(&wallet, open_store(&dir));
    session.connect().await.expect("connect");
    fill_form(&session, "1");
    wallet.fail_sends(Some("nonce too low"));

    session.submit().await.unwrap_err();
    let view = session.view();
    assert!(view.polling);
    assert_eq!(view.fields.transaction_hash, Some(pending.clone()));
    assert_eq!(view.fields.transaction_status, Some(TransactionStatus::Pending));
    assert!(view.fields.error.unwrap().contains("nonce too low"));

    let outcome = session.wait_for_outcome().await.expect("polling");
    assert!(!outcome.running);
    assert_eq!(outcome.hash, Some(pending.clone()));
    assert_eq!(outcome.status, Some(TransactionStatus::Confirmed));
    assert_eq!(wallet.receipt_lookups(&pending), 3);
}

#[tokio::test(start_paused = true)]
async fn test_new_submission_replaces_resumed_poll() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    restore_pending(&dir, "0xaaa");
    let wallet = FakeWallet::new(vec![sender()]);
    let old = TransactionId::new("0xaaa");
    let new = TransactionId::new("0xbbb");
    wallet.script_receipts(&old, vec![ReceiptStep::NotFound]);
    wallet.script_receipts(&new, vec![ReceiptStep::NotFound, ReceiptStep::Success]);
    wallet.queue_hash(new.clone());

    let store = open_store(&dir);
    let session = open_session(&wallet, store.clone());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(wallet.receipt_lookups(&old), 2);

    session.connect().await.expect("connect");
    fill_form(&session, "1");
    assert_eq!(session.submit().await.expect("submit"), new);

    let outcome = session.wait_for_outcome().await.expect("polling");
    assert_eq!(outcome.hash, Some(new.clone()));
    assert_eq!(outcome.status, Some(TransactionStatus::Confirmed));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(wallet.receipt_lookups(&old), 2);
    assert_eq!(wallet.receipt_lookups(&new), 2);
    assert_eq!(store.get(keys::TRANSACTION_HASH).unwrap(), None);
}

#[tokio::test]
async fn test_emptied_account_list_blocks_submit() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let wallet = FakeWallet::new(vec![sender()]);
    let store = open_store(&dir);
    let session = open_session(&wallet, store.clone());
    session.connect().await.expect("connect");
    fill_form(&session, "1");
    assert_eq!(
        store.get(keys::SENDER_ADDRESS).unwrap(),
        Some(sender().to_string())
    );

    wallet.set_accounts(vec![]);

    assert_eq!(session.fields().sender_address, "");
    assert_eq!(store.get(keys::SENDER_ADDRESS).unwrap(), None);
    let err = session.submit().await.unwrap_err();
    assert!(matches!(kind(&err), Some(TokenSendError::NotConnected)));
    assert!(wallet.sent_transfers().is_empty());

    // Reconnecting restores signing
    wallet.set_accounts(vec![sender()]);
    session.connect().await.expect("reconnect");
    assert!(session.can_submit());
}

#[tokio::test]
async fn test_no_wallet_leaves_session_disconnected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let session = TransferSession::open(None, open_store(&dir), &Config::default())
        .expect("failed to open session");

    let err = session.connect().await.unwrap_err();
    assert!(matches!(kind(&err), Some(TokenSendError::NoWallet)));

    let view = session.view();
    assert!(!view.has_wallet);
    assert!(!view.connected);
    assert!(!view.can_submit);
    assert_eq!(view.fields.sender_address, "");
}

#[test]
fn test_form_fields_survive_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let expected = {
        let store = open_store(&dir);
        let mut form = tokensend::FormState::restore(store).unwrap();
        form.set_sender_address(sender().to_string()).unwrap();
        form.set_recipient_address(RECIPIENT).unwrap();
        form.set_token_amount("0.000000000000000001").unwrap();
        form.set_contract_address(CONTRACT).unwrap();
        form.begin_transaction(TransactionId::new("0xfeed")).unwrap();
        form.set_estimated_seconds(Some(1.25)).unwrap();
        form.fields().clone()
    };

    let restored = tokensend::FormState::restore(open_store(&dir)).unwrap();
    assert_eq!(restored.fields(), &expected);
}
