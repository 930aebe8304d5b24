//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families. Composite keys are fixed-width where possible so
//! prefix iteration stays unambiguous.

use chrono::{DateTime, NaiveDate, Utc};

use outflow_core::{AccountId, DispatchId, EntryId, ListId, UserId};

/// Scope prefix for global suppression entries (16 zero bytes, the width of
/// a user id).
pub const GLOBAL_SCOPE: [u8; 16] = [0u8; 16];

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a ledger entry key from an entry ID.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create a user-entry index key.
///
/// Format: `user_id (16 bytes) || entry_id (16 bytes)`
///
/// Since ULIDs are time-ordered, entries for a user will be sorted by time.
#[must_use]
pub fn user_entry_key(user_id: &UserId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating all entries for a user.
#[must_use]
pub fn user_entries_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the entry ID from a user-entry index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_entry_id_from_user_key(key: &[u8]) -> EntryId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    EntryId::from_bytes(bytes)
}

/// Create a ledger idempotency index key.
///
/// Format: `user_id (16 bytes) || idempotency_key (utf-8)`
#[must_use]
pub fn ledger_idempotency_key(user_id: &UserId, idempotency_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + idempotency_key.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(idempotency_key.as_bytes());
    key
}

/// Create a recipient key: `list_id (16 bytes) || seq (4 bytes BE)`.
///
/// Big-endian sequence numbers preserve insertion order under byte-wise
/// iteration.
#[must_use]
pub fn recipient_key(list_id: &ListId, seq: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(20);
    key.extend_from_slice(list_id.as_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Create an account-by-user index key.
#[must_use]
pub fn user_account_key(user_id: &UserId, account_id: &AccountId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(account_id.as_bytes());
    key
}

/// Create a suppression key: `scope (16 bytes) || email (utf-8)`.
///
/// `scope` is the user id, or [`GLOBAL_SCOPE`] for global entries.
#[must_use]
pub fn suppression_key(user_id: Option<&UserId>, email: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + email.len());
    match user_id {
        Some(id) => key.extend_from_slice(id.as_bytes()),
        None => key.extend_from_slice(&GLOBAL_SCOPE),
    }
    key.extend_from_slice(email.as_bytes());
    key
}

/// Prefix for iterating a suppression scope.
#[must_use]
pub fn suppression_scope_prefix(user_id: Option<&UserId>) -> Vec<u8> {
    match user_id {
        Some(id) => id.as_bytes().to_vec(),
        None => GLOBAL_SCOPE.to_vec(),
    }
}

/// Create a dispatch record key from a dispatch ID.
#[must_use]
pub fn dispatch_key(dispatch_id: &DispatchId) -> Vec<u8> {
    dispatch_id.to_bytes().to_vec()
}

/// Create a due-index key: `send_at millis (8 bytes BE) || dispatch_id`.
///
/// Byte-wise iteration yields records earliest-due first.
#[must_use]
pub fn dispatch_due_key(send_at: &DateTime<Utc>, dispatch_id: &DispatchId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    #[allow(clippy::cast_sign_loss)]
    let millis = send_at.timestamp_millis().max(0) as u64;
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(&dispatch_id.to_bytes());
    key
}

/// Extract the dispatch ID from a due-index key.
///
/// # Panics
///
/// Panics if the key is not at least 24 bytes.
#[must_use]
pub fn extract_dispatch_id_from_due_key(key: &[u8]) -> DispatchId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[8..24]);
    DispatchId::from_bytes(bytes)
}

/// Create a dispatch idempotency index key: `key (utf-8) || 0x00 || id`.
///
/// The NUL separator keeps one key from matching another's prefix.
#[must_use]
pub fn dispatch_by_key_key(idempotency_key: &str, dispatch_id: &DispatchId) -> Vec<u8> {
    let mut key = Vec::with_capacity(idempotency_key.len() + 17);
    key.extend_from_slice(idempotency_key.as_bytes());
    key.push(0);
    key.extend_from_slice(&dispatch_id.to_bytes());
    key
}

/// Prefix for iterating dispatch records sharing an idempotency key.
#[must_use]
pub fn dispatch_by_key_prefix(idempotency_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(idempotency_key.len() + 1);
    key.extend_from_slice(idempotency_key.as_bytes());
    key.push(0);
    key
}

/// Create a send-counter key: `account_id (16 bytes) || yyyy-mm-dd`.
#[must_use]
pub fn send_counter_key(account_id: &AccountId, day: NaiveDate) -> Vec<u8> {
    let date = day.format("%Y-%m-%d").to_string();
    let mut key = Vec::with_capacity(16 + date.len());
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(date.as_bytes());
    key
}
