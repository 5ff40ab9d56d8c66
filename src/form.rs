//! Form state with write-through persistence
//!
//! [`FormState`] owns the session fields and mirrors every change into a
//! [`FieldStore`] before returning, so a restarted process sees exactly what
//! the previous one left behind. Status and error message are kept in memory
//! only; a transaction hash restored without a status is treated as pending.

use crate::error::Result;
use crate::storage::{keys, FieldStore};
use crate::types::{TransactionId, TransactionStatus};
use std::sync::{Arc, Mutex, MutexGuard};

/// Form shared between the session, submitter and poller
pub type SharedForm = Arc<Mutex<FormState>>;

/// Lock a shared form, recovering from a poisoned lock
///
/// Callers must not hold the guard across an `.await`.
pub fn lock_form(form: &Mutex<FormState>) -> MutexGuard<'_, FormState> {
    form.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Every field the user or the transfer flow can change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFields {
    /// Connected account shown as the sender
    pub sender_address: String,
    /// Transfer recipient as typed
    pub recipient_address: String,
    /// Decimal amount as typed
    pub token_amount: String,
    /// Token contract as typed
    pub contract_address: String,
    /// In-flight transaction
    pub transaction_hash: Option<TransactionId>,
    /// Status of the last transfer; always set while a hash is held
    pub transaction_status: Option<TransactionStatus>,
    /// Rough seconds-to-confirmation estimate
    pub estimated_seconds: Option<f64>,
    /// Last user-visible error message
    pub error: Option<String>,
}

/// Session fields bound to a durable store
#[derive(Debug)]
pub struct FormState {
    fields: SessionFields,
    store: Arc<dyn FieldStore>,
}

impl FormState {
    /// Restore fields from `store`; absent keys become empty
    ///
    /// A stored estimate that does not parse is dropped from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read
    pub fn restore(store: Arc<dyn FieldStore>) -> Result<Self> {
        let read = |key: &str| -> Result<String> { Ok(store.get(key)?.unwrap_or_default()) };

        let mut fields = SessionFields {
            sender_address: read(keys::SENDER_ADDRESS)?,
            recipient_address: read(keys::RECIPIENT_ADDRESS)?,
            token_amount: read(keys::TOKEN_AMOUNT)?,
            contract_address: read(keys::CONTRACT_ADDRESS)?,
            ..Default::default()
        };

        if let Some(hash) = store
            .get(keys::TRANSACTION_HASH)?
            .filter(|h| !h.trim().is_empty())
        {
            fields.transaction_hash = Some(TransactionId::new(hash));
            fields.transaction_status = Some(TransactionStatus::Pending);
        }

        if let Some(raw) = store.get(keys::ESTIMATED_TRANSACTION_TIME)? {
            match raw.parse::<f64>() {
                Ok(seconds) if seconds.is_finite() => fields.estimated_seconds = Some(seconds),
                _ => {
                    tracing::warn!(value = %raw, "Discarding unreadable stored estimate");
                    store.remove(keys::ESTIMATED_TRANSACTION_TIME)?;
                }
            }
        }

        tracing::debug!(
            pending = fields.transaction_hash.is_some(),
            "Restored form fields"
        );

        Ok(Self { fields, store })
    }

    /// Snapshot of all fields
    pub fn fields(&self) -> &SessionFields {
        &self.fields
    }

    pub fn sender_address(&self) -> &str {
        &self.fields.sender_address
    }

    pub fn recipient_address(&self) -> &str {
        &self.fields.recipient_address
    }

    pub fn token_amount(&self) -> &str {
        &self.fields.token_amount
    }

    pub fn contract_address(&self) -> &str {
        &self.fields.contract_address
    }

    pub fn transaction_hash(&self) -> Option<&TransactionId> {
        self.fields.transaction_hash.as_ref()
    }

    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        self.fields.transaction_status
    }

    pub fn estimated_seconds(&self) -> Option<f64> {
        self.fields.estimated_seconds
    }

    pub fn error(&self) -> Option<&str> {
        self.fields.error.as_deref()
    }

    pub fn set_sender_address(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.write_text(keys::SENDER_ADDRESS, &value)?;
        self.fields.sender_address = value;
        Ok(())
    }

    pub fn set_recipient_address(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.write_text(keys::RECIPIENT_ADDRESS, &value)?;
        self.fields.recipient_address = value;
        Ok(())
    }

    pub fn set_token_amount(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.write_text(keys::TOKEN_AMOUNT, &value)?;
        self.fields.token_amount = value;
        Ok(())
    }

    pub fn set_contract_address(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.write_text(keys::CONTRACT_ADDRESS, &value)?;
        self.fields.contract_address = value;
        Ok(())
    }

    /// Store or clear the in-flight transaction hash
    pub fn set_transaction_hash(&mut self, hash: Option<TransactionId>) -> Result<()> {
        match &hash {
            Some(id) => self.store.set(keys::TRANSACTION_HASH, id.as_str())?,
            None => self.store.remove(keys::TRANSACTION_HASH)?,
        }
        self.fields.transaction_hash = hash;
        Ok(())
    }

    /// Store or clear the confirmation estimate
    pub fn set_estimated_seconds(&mut self, seconds: Option<f64>) -> Result<()> {
        match seconds {
            Some(value) => self
                .store
                .set(keys::ESTIMATED_TRANSACTION_TIME, &value.to_string())?,
            None => self.store.remove(keys::ESTIMATED_TRANSACTION_TIME)?,
        }
        self.fields.estimated_seconds = seconds;
        Ok(())
    }

    pub fn set_status(&mut self, status: Option<TransactionStatus>) {
        self.fields.transaction_status = status;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.fields.error = error;
    }

    /// Record a freshly accepted transaction as pending
    pub fn begin_transaction(&mut self, hash: TransactionId) -> Result<()> {
        self.set_transaction_hash(Some(hash))?;
        self.fields.transaction_status = Some(TransactionStatus::Pending);
        Ok(())
    }

    /// Record a terminal status and drop the in-flight hash and estimate
    pub fn finish_transaction(
        &mut self,
        status: TransactionStatus,
        error: Option<String>,
    ) -> Result<()> {
        self.fields.transaction_status = Some(status);
        if error.is_some() {
            self.fields.error = error;
        }
        self.set_transaction_hash(None)?;
        self.set_estimated_seconds(None)
    }

    /// Forget every field, in memory and in the store
    pub fn clear(&mut self) -> Result<()> {
        for key in keys::ALL {
            self.store.remove(key)?;
        }
        self.fields = SessionFields::default();
        Ok(())
    }

    fn write_text(&self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            self.store.remove(key)
        } else {
            self.store.set(key, value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFieldStore;

    fn memory_form() -> (FormState, Arc<MemoryFieldStore>) {
        let store = Arc::new(MemoryFieldStore::new());
        let form = FormState::restore(store.clone()).unwrap();
        (form, store)
    }

    #[test]
    fn test_restore_from_empty_store() {
        let (form, _) = memory_form();
        assert_eq!(form.fields(), &SessionFields::default());
    }

    #[test]
    fn test_setters_write_through() {
        let (mut form, store) = memory_form();
        form.set_recipient_address("0xdef").unwrap();
        form.set_token_amount("1.5").unwrap();
        form.set_contract_address("0xabc").unwrap();
        form.set_sender_address("0x111").unwrap();

        assert_eq!(store.get(keys::RECIPIENT_ADDRESS).unwrap().as_deref(), Some("0xdef"));
        assert_eq!(store.get(keys::TOKEN_AMOUNT).unwrap().as_deref(), Some("1.5"));
        assert_eq!(store.get(keys::CONTRACT_ADDRESS).unwrap().as_deref(), Some("0xabc"));
        assert_eq!(store.get(keys::SENDER_ADDRESS).unwrap().as_deref(), Some("0x111"));
    }

    #[test]
    fn test_empty_value_removes_key() {
        let (mut form, store) = memory_form();
        form.set_token_amount("3").unwrap();
        form.set_token_amount("").unwrap();
        assert_eq!(store.get(keys::TOKEN_AMOUNT).unwrap(), None);
        assert_eq!(form.token_amount(), "");
    }

    #[test]
    fn test_round_trip_restores_identical_fields() {
        let (mut form, store) = memory_form();
        form.set_sender_address("0x111").unwrap();
        form.set_recipient_address("0xdef").unwrap();
        form.set_token_amount("1.5").unwrap();
        form.set_contract_address("0xabc").unwrap();
        form.begin_transaction(TransactionId::new("0x123")).unwrap();
        form.set_estimated_seconds(Some(4.2)).unwrap();

        let restored = FormState::restore(store.clone()).unwrap();
        assert_eq!(restored.fields(), form.fields());

        // Restoring again changes nothing
        let again = FormState::restore(store).unwrap();
        assert_eq!(again.fields(), restored.fields());
    }

    #[test]
    fn test_stored_hash_restores_as_pending() {
        let store = Arc::new(MemoryFieldStore::new());
        store.set(keys::TRANSACTION_HASH, "0x123").unwrap();

        let form = FormState::restore(store).unwrap();
        assert_eq!(form.transaction_hash(), Some(&TransactionId::new("0x123")));
        assert_eq!(form.transaction_status(), Some(TransactionStatus::Pending));
    }

    #[test]
    fn test_unreadable_estimate_is_discarded() {
        let store = Arc::new(MemoryFieldStore::new());
        store.set(keys::ESTIMATED_TRANSACTION_TIME, "soon").unwrap();

        let form = FormState::restore(store.clone()).unwrap();
        assert_eq!(form.estimated_seconds(), None);
        assert_eq!(store.get(keys::ESTIMATED_TRANSACTION_TIME).unwrap(), None);
    }

    #[test]
    fn test_finish_transaction_clears_hash_and_estimate() {
        let (mut form, store) = memory_form();
        form.begin_transaction(TransactionId::new("0x123")).unwrap();
        form.set_estimated_seconds(Some(2.0)).unwrap();

        form.finish_transaction(
            TransactionStatus::Failed,
            Some("Transaction failed".to_string()),
        )
        .unwrap();

        assert_eq!(form.transaction_status(), Some(TransactionStatus::Failed));
        assert_eq!(form.error(), Some("Transaction failed"));
        assert!(form.transaction_hash().is_none());
        assert!(form.estimated_seconds().is_none());
        assert_eq!(store.get(keys::TRANSACTION_HASH).unwrap(), None);
        assert_eq!(store.get(keys::ESTIMATED_TRANSACTION_TIME).unwrap(), None);
    }

    #[test]
    fn test_clear_removes_everything() {
        let (mut form, store) = memory_form();
        form.set_recipient_address("0xdef").unwrap();
        form.begin_transaction(TransactionId::new("0x123")).unwrap();

        form.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(form.fields(), &SessionFields::default());
    }
}
