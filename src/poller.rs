//! Receipt polling
//!
//! [`StatusPoller`] owns at most one background task that looks up the
//! receipt of the form's in-flight transaction on a fixed interval. The task
//! stops on a terminal receipt, when the form stops holding its hash, when
//! the optional attempt limit runs out, or when it is cancelled. Every check
//! is published as a [`PollSnapshot`] on a `watch` channel.

use crate::config::PollerConfig;
use crate::form::{lock_form, FormState, SharedForm};
use crate::types::{Receipt, TransactionId, TransactionStatus};
use crate::wallet::ChainClient;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Message recorded when a receipt reports a reverted transfer
pub const TRANSACTION_FAILED: &str = "Transaction failed";

/// Message recorded when the attempt limit runs out
pub const TIMED_OUT: &str = "Timed out waiting for receipt";

/// Default spacing between receipt lookups
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Poll state after the most recent check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot {
    /// Hash being polled
    pub hash: Option<TransactionId>,
    /// Form status after the check
    pub status: Option<TransactionStatus>,
    /// Form error after the check
    pub error: Option<String>,
    /// Receipt lookups made so far
    pub attempts: u32,
    /// Time of the last lookup
    pub checked_at: Option<DateTime<Utc>>,
    /// False once the poll task has exited
    pub running: bool,
}

impl PollSnapshot {
    /// True once the poll task has exited
    ///
    /// A terminal status alone is not enough: a rejected resubmission can
    /// record `Error` while the earlier hash is still being polled.
    pub fn is_settled(&self) -> bool {
        !self.running
    }
}

struct PollHandle {
    hash: TransactionId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Polls for the receipt of the form's in-flight transaction
pub struct StatusPoller {
    chain: Arc<dyn ChainClient>,
    form: SharedForm,
    interval: Duration,
    max_attempts: Option<u32>,
    handle: Mutex<Option<PollHandle>>,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .field("polling", &self.current_hash())
            .finish()
    }
}

impl StatusPoller {
    /// Create an idle poller
    pub fn new(
        chain: Arc<dyn ChainClient>,
        form: SharedForm,
        interval: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        let (snapshot, _) = watch::channel(PollSnapshot::default());
        Self {
            chain,
            form,
            interval,
            max_attempts,
            handle: Mutex::new(None),
            snapshot: Arc::new(snapshot),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(
        chain: Arc<dyn ChainClient>,
        form: SharedForm,
        config: &PollerConfig,
    ) -> Self {
        Self::new(
            chain,
            form,
            Duration::from_millis(config.interval_ms),
            config.max_attempts,
        )
    }

    /// Begin polling for `hash`
    ///
    /// A live poll for the same hash is left running. A poll for any other
    /// hash is cancelled first. Must be called from within a tokio runtime.
    pub fn start(&self, hash: TransactionId) {
        let mut slot = self.slot();

        if let Some(handle) = slot.as_ref() {
            if handle.hash == hash && handle.is_live() {
                debug!(%hash, "Already polling");
                return;
            }
        }
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let status = lock_form(&self.form).transaction_status();
        let mut id = 0;
        // Bumped under the channel lock so a superseded task cannot publish in between
        self.snapshot.send_modify(|current| {
            id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *current = PollSnapshot {
                hash: Some(hash.clone()),
                status,
                running: true,
                ..Default::default()
            };
        });

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(PollTask {
            hash: hash.clone(),
            chain: Arc::clone(&self.chain),
            form: Arc::clone(&self.form),
            interval: self.interval,
            max_attempts: self.max_attempts,
            snapshot: Arc::clone(&self.snapshot),
            cancel: cancel.clone(),
            id,
            generation: Arc::clone(&self.generation),
        }));

        info!(%hash, interval_ms = self.interval.as_millis() as u64, "Polling for receipt");
        *slot = Some(PollHandle { hash, cancel, task });
    }

    /// Cancel the running poll, if any
    pub fn stop(&self) {
        if let Some(handle) = self.slot().take() {
            handle.cancel.cancel();
            debug!(hash = %handle.hash, "Polling cancelled");
        }
    }

    /// True while a poll task is alive
    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(PollHandle::is_live)
    }

    /// Hash of the live poll
    pub fn current_hash(&self) -> Option<TransactionId> {
        self.slot()
            .as_ref()
            .filter(|h| h.is_live())
            .map(|h| h.hash.clone())
    }

    /// Receiver for poll snapshots
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Wait until the poll task exits and return its last snapshot
    pub async fn wait_terminal(&self) -> PollSnapshot {
        let mut rx = self.subscribe();
        loop {
            {
                let current = rx.borrow_and_update();
                if current.is_settled() {
                    return current.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask {
    hash: TransactionId,
    chain: Arc<dyn ChainClient>,
    form: SharedForm,
    interval: Duration,
    max_attempts: Option<u32>,
    snapshot: Arc<watch::Sender<PollSnapshot>>,
    cancel: CancellationToken,
    id: u64,
    generation: Arc<AtomicU64>,
}

async fn poll_loop(task: PollTask) {
    let mut ticker = tokio::time::interval(task.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first lookup waits one interval
    ticker.tick().await;

    let mut attempts = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = task.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !holds_hash(&task.form, &task.hash) {
            debug!(hash = %task.hash, "Form no longer holds this hash");
            break;
        }

        let lookup = tokio::select! {
            biased;
            _ = task.cancel.cancelled() => break,
            lookup = task.chain.transaction_receipt(&task.hash) => lookup,
        };
        attempts += 1;

        let flow = apply_lookup(&task, lookup, attempts);
        publish(&task, attempts, true);

        if let Flow::Stop = flow {
            break;
        }
    }

    publish(&task, attempts, false);
    debug!(hash = %task.hash, attempts, "Poll task exited");
}

fn holds_hash(form: &Mutex<FormState>, hash: &TransactionId) -> bool {
    lock_form(form).transaction_hash() == Some(hash)
}

fn apply_lookup(task: &PollTask, lookup: crate::error::Result<Option<Receipt>>, attempts: u32) -> Flow {
    let mut form = lock_form(&task.form);
    if form.transaction_hash() != Some(&task.hash) {
        return Flow::Stop;
    }

    let finished = match lookup {
        Ok(Some(receipt)) if receipt.success => {
            info!(hash = %task.hash, block = ?receipt.block_number, gas_used = receipt.gas_used, "Transfer confirmed");
            form.set_error(None);
            Some(form.finish_transaction(TransactionStatus::Confirmed, None))
        }
        Ok(Some(receipt)) => {
            warn!(hash = %task.hash, block = ?receipt.block_number, "Transfer reverted");
            Some(form.finish_transaction(
                TransactionStatus::Failed,
                Some(TRANSACTION_FAILED.to_string()),
            ))
        }
        Ok(None) => {
            debug!(hash = %task.hash, attempts, "No receipt yet");
            None
        }
        Err(e) => {
            warn!(hash = %task.hash, "Receipt lookup failed: {}", e);
            form.set_error(Some(e.to_string()));
            None
        }
    };

    if let Some(result) = finished {
        if let Err(e) = result {
            warn!(hash = %task.hash, "Could not clear stored transaction: {}", e);
        }
        return Flow::Stop;
    }

    if task.max_attempts.is_some_and(|max| attempts >= max) {
        warn!(hash = %task.hash, attempts, "Giving up on receipt");
        form.set_status(Some(TransactionStatus::Error));
        form.set_error(Some(TIMED_OUT.to_string()));
        return Flow::Stop;
    }

    Flow::Continue
}

fn publish(task: &PollTask, attempts: u32, running: bool) {
    let (status, error) = {
        let form = lock_form(&task.form);
        (form.transaction_status(), form.error().map(str::to_string))
    };
    let next = PollSnapshot {
        hash: Some(task.hash.clone()),
        status,
        error,
        attempts,
        checked_at: Some(Utc::now()),
        running,
    };
    // A superseded task must not overwrite its replacement's snapshot
    task.snapshot.send_if_modified(|current| {
        if task.generation.load(Ordering::SeqCst) != task.id {
            return false;
        }
        *current = next;
        true
    });
}
