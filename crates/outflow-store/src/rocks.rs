//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};
use serde::{Deserialize, Serialize};

use outflow_core::{
    AccountId, Campaign, CampaignId, DeadLetterRecord, DispatchId, DispatchRecord, DispatchStatus,
    EntryId, LedgerEntry, ListId, Recipient, RecipientList, SendingAccount, SuppressionEntry,
    UserId, UserRecord,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// Counter expiry: one hour of slack past the 24-hour cap window, so the
/// counter resets even if the increment that would roll to a new calendar
/// day is delayed.
const COUNTER_TTL_HOURS: i64 = 25;

/// Stored value of a per-account daily send counter.
#[derive(Debug, Serialize, Deserialize)]
struct CounterValue {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes send-counter read-modify-write cycles. The dispatcher is
    /// the only writer in practice; this guards direct `Store` users too.
    counter_lock: Mutex<()>,
    /// Serializes recipient appends per process (sequence allocation).
    recipient_lock: Mutex<()>,
    /// Lifetime stamped on a send counter at its first increment.
    counter_ttl: Duration,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            counter_lock: Mutex::new(()),
            recipient_lock: Mutex::new(()),
            counter_ttl: Duration::hours(COUNTER_TTL_HOURS),
        })
    }

    /// Override the send-counter lifetime. Lets tests age a counter past
    /// its expiry without waiting out the real window.
    #[cfg(test)]
    fn with_counter_ttl(mut self, ttl: Duration) -> Self {
        self.counter_ttl = ttl;
        self
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_cbor<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn put_cbor<T: serde::Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = Self::serialize(value)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    /// Collect all keys under a prefix in a column family.
    fn prefix_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(key.to_vec());
        }
        Ok(out)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Users and Sending Accounts
    // =========================================================================

    fn put_user(&self, user: &UserRecord) -> Result<()> {
        let cf_users = self.cf(cf::USERS)?;
        let value = Self::serialize(user)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_users, keys::user_key(&user.id), &value);
        if let Some(code) = &user.referral_code {
            let cf_codes = self.cf(cf::USERS_BY_REFERRAL_CODE)?;
            batch.put_cf(&cf_codes, code.as_bytes(), user.id.as_bytes());
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>> {
        self.get_cbor(cf::USERS, &keys::user_key(user_id))
    }

    fn find_user_by_referral_code(&self, code: &str) -> Result<Option<UserRecord>> {
        let cf = self.cf(cf::USERS_BY_REFERRAL_CODE)?;
        let Some(id_bytes) = self
            .db
            .get_cf(&cf, code.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let uuid = uuid::Uuid::from_slice(&id_bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.get_user(&UserId::from_uuid(uuid))
    }

    fn put_account(&self, account: &SendingAccount) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_by_user = self.cf(cf::ACCOUNTS_BY_USER)?;
        let value = Self::serialize(account)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, account.id.as_bytes(), &value);
        batch.put_cf(
            &cf_by_user,
            keys::user_account_key(&account.user_id, &account.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<SendingAccount>> {
        self.get_cbor(cf::ACCOUNTS, account_id.as_bytes())
    }

    fn account_for_user(&self, user_id: &UserId) -> Result<Option<SendingAccount>> {
        for key in self.prefix_keys(cf::ACCOUNTS_BY_USER, user_id.as_bytes())? {
            let uuid = uuid::Uuid::from_slice(&key[16..32])
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let account_id = AccountId::from_uuid(uuid);
            if let Some(account) = self.get_account(&account_id)? {
                if !account.revoked {
                    return Ok(Some(account));
                }
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Ledger
    // =========================================================================

    fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        let balance: Option<outflow_core::Balance> =
            self.get_cbor(cf::BALANCES, &keys::user_key(user_id))?;
        Ok(balance.map_or(0, |b| b.amount))
    }

    fn entry_by_idempotency_key(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(cf::LEDGER_IDEMPOTENCY)?;
        let key = keys::ledger_idempotency_key(user_id, idempotency_key);
        let Some(entry_id_bytes) = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&entry_id_bytes);
        self.get_entry(&EntryId::from_bytes(bytes))
    }

    fn get_entry(&self, entry_id: &EntryId) -> Result<Option<LedgerEntry>> {
        self.get_cbor(cf::LEDGER_ENTRIES, &keys::entry_key(entry_id))
    }

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_entries = self.cf(cf::LEDGER_ENTRIES)?;
        let cf_by_user = self.cf(cf::LEDGER_BY_USER)?;

        let balance = outflow_core::Balance {
            user_id: entry.user_id,
            amount: entry.balance_after,
            updated_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_balances,
            keys::user_key(&entry.user_id),
            Self::serialize(&balance)?,
        );
        batch.put_cf(
            &cf_entries,
            keys::entry_key(&entry.id),
            Self::serialize(entry)?,
        );
        batch.put_cf(
            &cf_by_user,
            keys::user_entry_key(&entry.user_id, &entry.id),
            [],
        );
        if let Some(key) = &entry.idempotency_key {
            let cf_idem = self.cf(cf::LEDGER_IDEMPOTENCY)?;
            batch.put_cf(
                &cf_idem,
                keys::ledger_idempotency_key(&entry.user_id, key),
                entry.id.to_bytes(),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_entries_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let prefix = keys::user_entries_prefix(user_id);
        // ULID suffixes sort oldest-first; reverse for newest-first.
        let mut all_keys = self.prefix_keys(cf::LEDGER_BY_USER, &prefix)?;
        all_keys.reverse();

        let mut entries = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }
            let entry_id = keys::extract_entry_id_from_user_key(&key);
            if let Some(entry) = self.get_entry(&entry_id)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Campaigns and Recipient Lists
    // =========================================================================

    fn put_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.put_cbor(cf::CAMPAIGNS, campaign.id.as_bytes(), campaign)
    }

    fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Option<Campaign>> {
        self.get_cbor(cf::CAMPAIGNS, campaign_id.as_bytes())
    }

    fn put_recipient_list(&self, list: &RecipientList) -> Result<()> {
        self.put_cbor(cf::RECIPIENT_LISTS, list.id.as_bytes(), list)
    }

    fn get_recipient_list(&self, list_id: &ListId) -> Result<Option<RecipientList>> {
        self.get_cbor(cf::RECIPIENT_LISTS, list_id.as_bytes())
    }

    fn append_recipient(&self, list_id: &ListId, recipient: &Recipient) -> Result<()> {
        let _guard = self
            .recipient_lock
            .lock()
            .map_err(|_| StoreError::Database("recipient lock poisoned".into()))?;

        #[allow(clippy::cast_possible_truncation)]
        let seq = self.prefix_keys(cf::RECIPIENTS, list_id.as_bytes())?.len() as u32;
        self.put_cbor(cf::RECIPIENTS, &keys::recipient_key(list_id, seq), recipient)
    }

    fn list_recipients(&self, list_id: &ListId, limit: usize) -> Result<Vec<Recipient>> {
        let cf = self.cf(cf::RECIPIENTS)?;
        let prefix = list_id.as_bytes();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));

        let mut recipients = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) || recipients.len() >= limit {
                break;
            }
            recipients.push(Self::deserialize(&value)?);
        }
        Ok(recipients)
    }

    // =========================================================================
    // Suppression
    // =========================================================================

    fn add_suppression(&self, entry: &SuppressionEntry) -> Result<()> {
        let key = keys::suppression_key(entry.user_id.as_ref(), &entry.email);
        // Last write wins; entries are value-identical per (scope, email).
        self.put_cbor(cf::SUPPRESSIONS, &key, entry)
    }

    fn suppressed_emails(&self, user_id: &UserId) -> Result<HashSet<String>> {
        let mut out = HashSet::new();
        for scope in [None, Some(user_id)] {
            let prefix = keys::suppression_scope_prefix(scope);
            for key in self.prefix_keys(cf::SUPPRESSIONS, &prefix)? {
                if let Ok(email) = std::str::from_utf8(&key[16..]) {
                    out.insert(email.to_string());
                }
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Dispatch Records
    // =========================================================================

    fn insert_dispatch_records(&self, records: &[DispatchRecord]) -> Result<()> {
        let cf_records = self.cf(cf::DISPATCH_RECORDS)?;
        let cf_due = self.cf(cf::DISPATCH_DUE)?;
        let cf_by_key = self.cf(cf::DISPATCH_BY_KEY)?;

        let mut batch = WriteBatch::default();
        for record in records {
            batch.put_cf(
                &cf_records,
                keys::dispatch_key(&record.id),
                Self::serialize(record)?,
            );
            if record.status == DispatchStatus::Drafted {
                batch.put_cf(&cf_due, keys::dispatch_due_key(&record.send_at, &record.id), []);
            }
            batch.put_cf(
                &cf_by_key,
                keys::dispatch_by_key_key(&record.idempotency_key, &record.id),
                [],
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_dispatch_record(&self, dispatch_id: &DispatchId) -> Result<Option<DispatchRecord>> {
        self.get_cbor(cf::DISPATCH_RECORDS, &keys::dispatch_key(dispatch_id))
    }

    fn update_dispatch_record(&self, record: &DispatchRecord) -> Result<()> {
        let cf_records = self.cf(cf::DISPATCH_RECORDS)?;
        let cf_due = self.cf(cf::DISPATCH_DUE)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_records,
            keys::dispatch_key(&record.id),
            Self::serialize(record)?,
        );
        if record.status != DispatchStatus::Drafted {
            batch.delete_cf(&cf_due, keys::dispatch_due_key(&record.send_at, &record.id));
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn due_dispatch_records(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DispatchRecord>> {
        let cf = self.cf(cf::DISPATCH_DUE)?;
        #[allow(clippy::cast_sign_loss)]
        let cutoff = (now.timestamp_millis().max(0) as u64).to_be_bytes();

        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if &key[..8] > &cutoff[..] || records.len() >= limit {
                break;
            }
            let dispatch_id = keys::extract_dispatch_id_from_due_key(&key);
            // The index can momentarily lag the record; re-check status.
            if let Some(record) = self.get_dispatch_record(&dispatch_id)? {
                if record.status == DispatchStatus::Drafted {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }

    fn count_dispatch_records_by_key(&self, idempotency_key: &str) -> Result<u64> {
        let prefix = keys::dispatch_by_key_prefix(idempotency_key);
        Ok(self.prefix_keys(cf::DISPATCH_BY_KEY, &prefix)?.len() as u64)
    }

    fn list_dispatch_records_by_key(&self, idempotency_key: &str) -> Result<Vec<DispatchRecord>> {
        let prefix = keys::dispatch_by_key_prefix(idempotency_key);
        let mut records = Vec::new();
        for key in self.prefix_keys(cf::DISPATCH_BY_KEY, &prefix)? {
            if key.len() < 16 {
                continue;
            }
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&key[key.len() - 16..]);
            let id = DispatchId::from_bytes(bytes);
            if let Some(record) = self.get_dispatch_record(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    // =========================================================================
    // Send Counters
    // =========================================================================

    fn send_counter(&self, account_id: &AccountId, day: NaiveDate) -> Result<u64> {
        let key = keys::send_counter_key(account_id, day);
        let Some(value) = self.get_cbor::<CounterValue>(cf::SEND_COUNTERS, &key)? else {
            return Ok(0);
        };
        if value.expires_at <= Utc::now() {
            // Purge the stale value so counter keys do not accumulate.
            let cf = self.cf(cf::SEND_COUNTERS)?;
            self.db
                .delete_cf(&cf, &key)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            return Ok(0);
        }
        Ok(value.count)
    }

    fn incr_send_counter(&self, account_id: &AccountId, day: NaiveDate) -> Result<u64> {
        let _guard = self
            .counter_lock
            .lock()
            .map_err(|_| StoreError::Database("counter lock poisoned".into()))?;

        let key = keys::send_counter_key(account_id, day);
        let now = Utc::now();
        let current: Option<CounterValue> = self.get_cbor(cf::SEND_COUNTERS, &key)?;

        let next = match current {
            Some(value) if value.expires_at > now => CounterValue {
                count: value.count + 1,
                expires_at: value.expires_at,
            },
            // Missing or expired: restart and stamp the expiry.
            _ => CounterValue {
                count: 1,
                expires_at: now + self.counter_ttl,
            },
        };

        self.put_cbor(cf::SEND_COUNTERS, &key, &next)?;
        Ok(next.count)
    }

    // =========================================================================
    // Dead Letters
    // =========================================================================

    fn put_dead_letter(&self, record: &DeadLetterRecord) -> Result<()> {
        let key = ulid::Ulid::new().to_bytes();
        self.put_cbor(cf::DEAD_LETTERS, &key, record)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterRecord>> {
        let cf = self.cf(cf::DEAD_LETTERS)?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::End) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if records.len() >= limit {
                break;
            }
            records.push(Self::deserialize(&value)?);
        }
        Ok(records)
    }
}
