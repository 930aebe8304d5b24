//! One-time referral rewards.
//!
//! When a referred user first schedules a campaign (or makes a first
//! purchase), their referrer is credited once. The reward is keyed by
//! `referral_reward_<referee_id>` so re-evaluation is idempotent at the
//! ledger level.

use std::sync::Arc;

use outflow_core::{EntryReason, PricingConfig, UserId};
use outflow_store::Store;

use crate::error::Result;
use crate::ledger::LedgerEngine;

/// Evaluates and grants referral rewards.
pub struct ReferralRewards {
    store: Arc<dyn Store>,
    ledger: Arc<LedgerEngine>,
    reward_credits: i64,
}

impl ReferralRewards {
    /// Create the evaluator.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, ledger: Arc<LedgerEngine>, pricing: &PricingConfig) -> Self {
        Self {
            store,
            ledger,
            reward_credits: pricing.referral_reward_credits,
        }
    }

    /// The idempotency key reserving one reward per referee.
    #[must_use]
    pub fn reward_key(referee_id: &UserId) -> String {
        format!("referral_reward_{referee_id}")
    }

    /// If `referee_id` was referred and the referrer has not yet been
    /// rewarded for this referee, credit the referrer. A no-op for
    /// unreferred users, unknown referrers, and already-granted rewards.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or ledger fails.
    pub async fn grant_if_eligible(&self, referee_id: &UserId) -> Result<()> {
        let Some(referee) = self.store.get_user(referee_id)? else {
            return Ok(());
        };
        let Some(referrer_id) = referee.referred_by else {
            return Ok(());
        };
        if self.store.get_user(&referrer_id)?.is_none() {
            return Ok(());
        }

        let key = Self::reward_key(referee_id);
        if self
            .store
            .entry_by_idempotency_key(&referrer_id, &key)?
            .is_some()
        {
            return Ok(());
        }

        self.ledger
            .apply_entry(
                referrer_id,
                self.reward_credits,
                EntryReason::Referral,
                Some(("referral_reward".into(), referee_id.to_string())),
                Some(key),
            )
            .await?;

        tracing::info!(
            referrer_id = %referrer_id,
            referee_id = %referee_id,
            credits = %self.reward_credits,
            "Referral reward granted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outflow_core::UserRecord;
    use outflow_store::RocksStore;
    use tempfile::TempDir;

    fn setup() -> (ReferralRewards, Arc<LedgerEngine>, UserId, UserId, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<RocksStore> = Arc::new(RocksStore::open(dir.path()).unwrap());

        let referrer = UserRecord::new(UserId::generate(), "referrer@example.com");
        store.put_user(&referrer).unwrap();

        let mut referee = UserRecord::new(UserId::generate(), "referee@example.com");
        referee.referred_by = Some(referrer.id);
        store.put_user(&referee).unwrap();

        let store: Arc<dyn Store> = store;
        let ledger = Arc::new(LedgerEngine::new(Arc::clone(&store)));
        let rewards = ReferralRewards::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            &PricingConfig::default(),
        );
        (rewards, ledger, referrer.id, referee.id, dir)
    }

    #[tokio::test]
    async fn reward_granted_once() {
        let (rewards, ledger, referrer_id, referee_id, _dir) = setup();

        rewards.grant_if_eligible(&referee_id).await.unwrap();
        assert_eq!(ledger.get_balance(&referrer_id).unwrap(), 25);

        // Re-evaluation is a no-op.
        rewards.grant_if_eligible(&referee_id).await.unwrap();
        assert_eq!(ledger.get_balance(&referrer_id).unwrap(), 25);
    }

    #[tokio::test]
    async fn unreferred_user_grants_nothing() {
        let (rewards, ledger, referrer_id, _referee_id, _dir) = setup();

        // The referrer themselves has no referred_by.
        rewards.grant_if_eligible(&referrer_id).await.unwrap();
        assert_eq!(ledger.get_balance(&referrer_id).unwrap(), 0);
    }
}
