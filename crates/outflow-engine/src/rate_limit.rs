//! Per-account daily send cap.
//!
//! The limiter is check-then-increment, not reserve: the dispatcher asks
//! [`SendRateLimiter::over_cap`] before a send and calls
//! [`SendRateLimiter::record_send`] after the provider accepts it. Counter
//! store failures fail OPEN: a broken counter must throttle nothing, so
//! both paths degrade to "under cap" with a loud log line.

use std::sync::Arc;

use chrono::Utc;

use outflow_core::{AccountId, DispatchConfig};
use outflow_store::Store;

/// Tracks sends per account per UTC day against a fixed cap.
pub struct SendRateLimiter {
    store: Arc<dyn Store>,
    daily_cap: u64,
}

impl SendRateLimiter {
    /// Create a limiter with the configured daily cap.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, dispatch: &DispatchConfig) -> Self {
        Self {
            store,
            daily_cap: dispatch.daily_send_cap,
        }
    }

    /// Sends counted against `account_id` so far today. Reads 0 when the
    /// counter is missing or the store is unreachable.
    pub fn sent_today(&self, account_id: &AccountId) -> u64 {
        let day = Utc::now().date_naive();
        match self.store.send_counter(account_id, day) {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(
                    account_id = %account_id,
                    error = %e,
                    "Send counter unavailable; treating account as under cap"
                );
                0
            }
        }
    }

    /// Whether `account_id` has already reached today's cap.
    pub fn over_cap(&self, account_id: &AccountId) -> bool {
        self.sent_today(account_id) >= self.daily_cap
    }

    /// Count a completed send against today's cap. Returns the
    /// post-increment value, or 0 when the store is unreachable.
    pub fn record_send(&self, account_id: &AccountId) -> u64 {
        let day = Utc::now().date_naive();
        match self.store.incr_send_counter(account_id, day) {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(
                    account_id = %account_id,
                    error = %e,
                    "Send counter increment failed; send remains uncounted"
                );
                0
            }
        }
    }

    /// The configured daily ceiling, shared by all accounts.
    #[must_use]
    pub fn daily_cap(&self) -> u64 {
        self.daily_cap
    }
}
