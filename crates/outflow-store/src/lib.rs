//! `RocksDB` storage layer for outflow.
//!
//! This crate provides persistent storage for users, balances, the ledger,
//! campaigns, recipient lists, suppression entries, dispatch records, send
//! counters, and dead letters, using `RocksDB` with column families for
//! efficient indexing and `WriteBatch` for multi-key atomic writes.
//!
//! # Architecture
//!
//! Values are CBOR-encoded. Indexes are separate column families whose keys
//! embed the ordering (`user_id || ulid` for time-ordered history,
//! `send_at_be || id` for the due queue, big-endian sequence numbers for
//! recipient list order).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use outflow_core::{
    AccountId, Campaign, CampaignId, DeadLetterRecord, DispatchId, DispatchRecord, EntryId,
    LedgerEntry, ListId, Recipient, RecipientList, SendingAccount, SuppressionEntry, UserId,
    UserRecord,
};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Users and Sending Accounts
    // =========================================================================

    /// Insert or update a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &UserRecord) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>>;

    /// Find a user by referral code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>>;

    /// Insert or update a sending account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &SendingAccount) -> Result<()>;

    /// Get a sending account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<SendingAccount>>;

    /// Find the first non-revoked sending account for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn account_for_user(&self, user_id: &UserId) -> Result<Option<SendingAccount>>;

    // =========================================================================
    // Ledger
    // =========================================================================

    /// Current balance for a user; 0 when no balance record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, user_id: &UserId) -> Result<i64>;

    /// Look up an entry by `(user_id, idempotency_key)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn entry_by_idempotency_key(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> Result<Option<LedgerEntry>>;

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>>;

    /// Append a ledger entry and persist its `balance_after` as the user's
    /// balance, atomically (one write batch covering the balance, the
    /// entry, the user index, and the idempotency index).
    ///
    /// The caller is responsible for serializing concurrent appends for one
    /// user; the batch only guarantees the writes land together.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// List entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Campaigns and Recipient Lists
    // =========================================================================

    /// Insert or update a campaign.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Get a campaign by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>>;

    /// Insert or update a recipient list.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_recipient_list(&self, list: &RecipientList) -> Result<()>;

    /// Get a recipient list by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_recipient_list(&self, list_id: &ListId) -> Result<Option<RecipientList>>;

    /// Append a recipient to a list, preserving insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_recipient(&self, list_id: &ListId, recipient: &Recipient) -> Result<()>;

    /// List recipients in insertion order, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_recipients(&self, list_id: &ListId, limit: usize) -> Result<Vec<Recipient>>;

    // =========================================================================
    // Suppression
    // =========================================================================

    /// Add a suppression entry (idempotent).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn add_suppression(&self, entry: &SuppressionEntry) -> Result<()>;

    /// All suppressed emails visible to a user: global entries plus the
    /// user's own.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn suppressed_emails(&self, user_id: &UserId) -> Result<HashSet<String>>;

    // =========================================================================
    // Dispatch Records
    // =========================================================================

    /// Insert a batch of dispatch records atomically, maintaining the due
    /// index and the idempotency-key index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_dispatch_records(&self, records: &[DispatchRecord]) -> Result<()>;

    /// Get a dispatch record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_dispatch_record(&self, dispatch_id: &DispatchId) -> Result<Option<DispatchRecord>>;

    /// Persist a record's new state. Removes the due-index entry in the
    /// same batch once the record has left `drafted`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn update_dispatch_record(&self, record: &DispatchRecord) -> Result<()>;

    /// Drafted records with `send_at <= now`, earliest due first, up to
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn due_dispatch_records(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DispatchRecord>>;

    /// Count records created under one scheduling idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn count_dispatch_records_by_key(&self, idempotency_key: &str) -> Result<u64>;

    /// All records created under `idempotency_key`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_dispatch_records_by_key(&self, idempotency_key: &str) -> Result<Vec<DispatchRecord>>;

    // =========================================================================
    // Send Counters
    // =========================================================================

    /// Current send count for an account on a UTC day; 0 when the counter
    /// is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn send_counter(&self, account_id: &AccountId, day: NaiveDate) -> Result<u64>;

    /// Increment the counter and return the post-increment value. The
    /// first increment stamps a 25-hour expiry; expired counters restart
    /// from zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn incr_send_counter(&self, account_id: &AccountId, day: NaiveDate) -> Result<u64>;

    // =========================================================================
    // Dead Letters
    // =========================================================================

    /// Append a dead-letter record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_dead_letter(&self, record: &DeadLetterRecord) -> Result<()>;

    /// List dead letters, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterRecord>>;
}
