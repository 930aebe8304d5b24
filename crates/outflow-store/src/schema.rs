//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: users by referral code, keyed by the code bytes.
    pub const USERS_BY_REFERRAL_CODE: &str = "users_by_referral_code";

    /// Current balances, keyed by `user_id`.
    pub const BALANCES: &str = "balances";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: entries by user, keyed by `user_id || entry_id`.
    /// Value is empty (index only).
    pub const LEDGER_BY_USER: &str = "ledger_by_user";

    /// Index: entries by idempotency key, keyed by `user_id || key`.
    /// Value is the entry id.
    pub const LEDGER_IDEMPOTENCY: &str = "ledger_idempotency";

    /// Campaigns, keyed by `campaign_id`.
    pub const CAMPAIGNS: &str = "campaigns";

    /// Recipient lists, keyed by `list_id`.
    pub const RECIPIENT_LISTS: &str = "recipient_lists";

    /// Recipients in insertion order, keyed by `list_id || seq_be`.
    pub const RECIPIENTS: &str = "recipients";

    /// Sending accounts, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: accounts by user, keyed by `user_id || account_id`.
    pub const ACCOUNTS_BY_USER: &str = "accounts_by_user";

    /// Suppression entries, keyed by `scope || email` where scope is the
    /// user id or 16 zero bytes for global entries.
    pub const SUPPRESSIONS: &str = "suppressions";

    /// Dispatch records, keyed by `dispatch_id` (ULID).
    pub const DISPATCH_RECORDS: &str = "dispatch_records";

    /// Index: drafted records by due time, keyed by
    /// `send_at_millis_be || dispatch_id`. Maintained only while a record
    /// is in `drafted`.
    pub const DISPATCH_DUE: &str = "dispatch_due";

    /// Index: records by scheduling idempotency key, keyed by
    /// `key || dispatch_id`.
    pub const DISPATCH_BY_KEY: &str = "dispatch_by_key";

    /// Per-account daily send counters, keyed by `account_id || yyyy-mm-dd`.
    pub const SEND_COUNTERS: &str = "send_counters";

    /// Dead-letter records, keyed by ULID.
    pub const DEAD_LETTERS: &str = "dead_letters";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_REFERRAL_CODE,
        cf::BALANCES,
        cf::LEDGER_ENTRIES,
        cf::LEDGER_BY_USER,
        cf::LEDGER_IDEMPOTENCY,
        cf::CAMPAIGNS,
        cf::RECIPIENT_LISTS,
        cf::RECIPIENTS,
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_USER,
        cf::SUPPRESSIONS,
        cf::DISPATCH_RECORDS,
        cf::DISPATCH_DUE,
        cf::DISPATCH_BY_KEY,
        cf::SEND_COUNTERS,
        cf::DEAD_LETTERS,
    ]
}
