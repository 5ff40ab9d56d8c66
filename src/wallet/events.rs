//! Account-change notifications
//!
//! A wallet announces every change of its authorized account set through an
//! [`AccountsChangedHub`]. Listeners register a handler and receive a
//! [`Subscription`]; dropping the subscription (or calling
//! [`Subscription::unsubscribe`]) removes the handler.
//!
//! Handlers run synchronously inside [`AccountsChangedHub::emit`], outside
//! the hub's lock, so a handler may itself subscribe or unsubscribe.

use alloy::primitives::Address;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Callback invoked with the new account set; empty means locked/disconnected.
pub type AccountsHandler = Arc<dyn Fn(&[Address]) + Send + Sync + 'static>;

#[derive(Default)]
struct HubInner {
    next_id: u64,
    handlers: BTreeMap<u64, AccountsHandler>,
}

fn lock(inner: &Mutex<HubInner>) -> MutexGuard<'_, HubInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of account-change handlers
#[derive(Clone, Default)]
pub struct AccountsChangedHub {
    inner: Arc<Mutex<HubInner>>,
}

impl std::fmt::Debug for AccountsChangedHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountsChangedHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl AccountsChangedHub {
    /// Create a hub with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered while the returned
    /// subscription is alive
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use alloy::primitives::Address;
    /// use tokensend::wallet::AccountsChangedHub;
    ///
    /// let hub = AccountsChangedHub::new();
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&calls);
    /// let subscription = hub.subscribe(Arc::new(move |_accounts: &[Address]| {
    ///     counter.fetch_add(1, Ordering::SeqCst);
    /// }));
    ///
    /// hub.emit(&[]);
    /// subscription.unsubscribe();
    /// hub.emit(&[]);
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn subscribe(&self, handler: AccountsHandler) -> Subscription {
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.insert(id, handler);

        Subscription {
            id,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `accounts` to every registered handler, in subscription order
    pub fn emit(&self, accounts: &[Address]) {
        let handlers: Vec<AccountsHandler> = lock(&self.inner).handlers.values().cloned().collect();

        tracing::debug!(
            accounts = accounts.len(),
            subscribers = handlers.len(),
            "Dispatching accounts changed"
        );

        for handler in handlers {
            handler(accounts);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).handlers.len()
    }
}

/// Handle keeping an account-change handler registered
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    hub: Weak<Mutex<HubInner>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    /// Remove the handler now
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.hub.upgrade() {
            lock(&inner).handlers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: &Arc<AtomicUsize>) -> AccountsHandler {
        let counter = Arc::clone(counter);
        Arc::new(move |_accounts: &[Address]| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let hub = AccountsChangedHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let _a = hub.subscribe(counting_handler(&first));
        let _b = hub.subscribe(counting_handler(&second));

        hub.emit(&[Address::ZERO]);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 2);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = AccountsChangedHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = hub.subscribe(counting_handler(&calls));
        drop(subscription);

        hub.emit(&[]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_receives_accounts() {
        let hub = AccountsChangedHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = hub.subscribe(Arc::new(move |accounts: &[Address]| {
            sink.lock().unwrap().push(accounts.to_vec());
        }));

        let account = Address::repeat_byte(0x11);
        hub.emit(&[account]);
        hub.emit(&[]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec![account]);
        assert!(seen[1].is_empty());
    }

    #[test]
    fn test_subscription_outliving_hub_is_harmless() {
        let hub = AccountsChangedHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = hub.subscribe(counting_handler(&calls));
        drop(hub);
        drop(subscription);
    }
}
