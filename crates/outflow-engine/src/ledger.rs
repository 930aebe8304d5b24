//! The ledger engine: atomic, idempotent balance mutation.
//!
//! One operation, `apply_entry`, owns every change to a user's balance.
//! Concurrent callers for the same user serialize on a per-user mutex so
//! two debits can never both pass the non-negative check against a stale
//! read; the store's write batch keeps the balance snapshot and the entry
//! consistent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use outflow_core::{EntryReason, LedgerEntry, UserId};
use outflow_store::Store;

use crate::error::{EngineError, Result};

/// Applies ledger entries and answers balance queries.
pub struct LedgerEngine {
    store: Arc<dyn Store>,
    /// One async mutex per user, created on first use. Held across the
    /// read-check-write window of `apply_entry`.
    user_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl LedgerEngine {
    /// Create a ledger engine over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.user_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(user_id).or_default())
    }

    /// Current balance for a user; 0 for a fresh user with no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        Ok(self.store.get_balance(user_id)?)
    }

    /// List ledger entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_entries(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.list_entries_by_user(user_id, limit, offset)?)
    }

    /// Apply a ledger entry and return it with the resulting balance.
    ///
    /// When `idempotency_key` is supplied and an entry already exists for
    /// `(user_id, key)`, that first entry is returned with the *current*
    /// balance and nothing is written, making the call safe to retry
    /// arbitrarily (network retries, duplicate webhook deliveries,
    /// duplicate job dispatch).
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the user does not exist.
    /// - [`EngineError::InsufficientCredits`] if the balance would go
    ///   negative; no entry is written and no partial mutation occurs.
    /// - [`EngineError::Storage`] if the store fails.
    pub async fn apply_entry(
        &self,
        user_id: UserId,
        amount: i64,
        reason: EntryReason,
        reference: Option<(String, String)>,
        idempotency_key: Option<String>,
    ) -> Result<(LedgerEntry, i64)> {
        if self.store.get_user(&user_id)?.is_none() {
            return Err(EngineError::not_found("user", user_id));
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.entry_by_idempotency_key(&user_id, key)? {
                let balance = self.store.get_balance(&user_id)?;
                tracing::debug!(
                    user_id = %user_id,
                    idempotency_key = %key,
                    entry_id = %existing.id,
                    "Ledger entry replayed idempotently"
                );
                return Ok((existing, balance));
            }
        }

        let current = self.store.get_balance(&user_id)?;
        let balance_after = current + amount;
        if balance_after < 0 {
            return Err(EngineError::InsufficientCredits {
                balance: current,
                required: -amount,
            });
        }

        let entry = LedgerEntry::new(
            user_id,
            amount,
            balance_after,
            reason,
            reference,
            idempotency_key,
        );
        self.store.append_entry(&entry)?;

        tracing::info!(
            user_id = %user_id,
            amount = %amount,
            reason = %reason,
            balance_after = %balance_after,
            "Ledger entry applied"
        );

        Ok((entry, balance_after))
    }
}
