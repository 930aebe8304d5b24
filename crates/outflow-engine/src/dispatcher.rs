//! The send dispatcher: claims due drafted records and pushes them through
//! the provider, one at a time, within the per-account daily cap.
//!
//! Runs never overlap. A record is moved to `sending` and persisted before
//! any provider call, so a crash mid-send leaves it visibly stuck instead
//! of being re-claimed and sent twice.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use outflow_core::{DispatchConfig, DispatchRecord, DispatchStatus};
use outflow_store::Store;

use crate::error::Result;
use crate::providers::MailProvider;
use crate::rate_limit::SendRateLimiter;

/// Outcome counts for a single dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchSummary {
    /// Due records claimed this run.
    pub claimed: u64,

    /// Records delivered to the provider.
    pub sent: u64,

    /// Records that failed permanently.
    pub failed: u64,

    /// Records deferred by the daily cap.
    pub skipped: u64,
}

/// Claims and sends due dispatch records.
pub struct SendDispatcher {
    store: Arc<dyn Store>,
    mail: Arc<dyn MailProvider>,
    limiter: SendRateLimiter,
    batch_size: usize,
    run_lock: Mutex<()>,
}

impl SendDispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, mail: Arc<dyn MailProvider>, dispatch: &DispatchConfig) -> Self {
        let limiter = SendRateLimiter::new(Arc::clone(&store), dispatch);
        Self {
            store,
            mail,
            limiter,
            batch_size: dispatch.batch_size,
            run_lock: Mutex::new(()),
        }
    }

    /// Process one batch of due records. Returns immediately with an empty
    /// summary if another run is still in flight.
    ///
    /// # Errors
    ///
    /// Returns an error only if claiming the batch fails; per-record
    /// provider and store failures are absorbed into the record's state.
    pub async fn run(&self) -> Result<DispatchSummary> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::debug!("Dispatcher run already in flight; yielding");
            return Ok(DispatchSummary::default());
        };

        let due = self.store.due_dispatch_records(Utc::now(), self.batch_size)?;
        #[allow(clippy::cast_possible_truncation)]
        let claimed = due.len() as u64;
        let mut summary = DispatchSummary {
            claimed,
            ..DispatchSummary::default()
        };

        for mut record in due {
            match self.dispatch_one(&mut record).await {
                Ok(DispatchStatus::Sent) => summary.sent += 1,
                Ok(DispatchStatus::Skipped) => summary.skipped += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    // A store failure here means even the failed state
                    // could not be persisted; the record stays claimable.
                    tracing::error!(
                        dispatch_id = %record.id,
                        error = %e,
                        "Dispatch record could not be persisted"
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.claimed > 0 {
            tracing::info!(
                claimed = %summary.claimed,
                sent = %summary.sent,
                failed = %summary.failed,
                skipped = %summary.skipped,
                "Dispatcher run complete"
            );
        }
        Ok(summary)
    }

    /// Drive one record to a terminal state, persisting every transition.
    async fn dispatch_one(&self, record: &mut DispatchRecord) -> Result<DispatchStatus> {
        record.status = DispatchStatus::Sending;
        record.updated_at = Utc::now();
        self.store.update_dispatch_record(record)?;

        let account = match self.store.get_account(&record.account_id)? {
            Some(account) if !account.revoked => account,
            Some(_) => {
                record.mark_failed("account revoked");
                self.finish(record)?;
                return Ok(record.status);
            }
            None => {
                record.mark_failed("sending account no longer exists");
                self.finish(record)?;
                return Ok(record.status);
            }
        };

        if self.limiter.over_cap(&account.id) {
            record.mark_skipped("daily cap reached");
            self.finish(record)?;
            return Ok(record.status);
        }

        let Some(draft_id) = record.provider_draft_id.clone() else {
            record.mark_failed("no provider draft id");
            self.finish(record)?;
            return Ok(record.status);
        };

        let sent = async {
            let token = self.mail.valid_credential(&account).await?;
            self.mail.send_draft(&token, &account.id, &draft_id).await
        }
        .await;

        match sent {
            Ok(message_id) => {
                record.mark_sent(message_id);
                self.limiter.record_send(&account.id);
            }
            Err(e) => {
                tracing::warn!(
                    dispatch_id = %record.id,
                    account_id = %account.id,
                    error = %e,
                    "Provider send failed"
                );
                record.mark_failed(&e.0);
            }
        }
        self.finish(record)?;
        Ok(record.status)
    }

    /// Persist a terminal transition. The campaign row is never touched
    /// here; campaign status and counters belong to the scheduler.
    fn finish(&self, record: &DispatchRecord) -> Result<()> {
        Ok(self.store.update_dispatch_record(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use outflow_core::CampaignStatus;

    #[tokio::test]
    async fn nothing_due_is_a_noop() {
        let fx = Fixture::new(100, &["a@example.com"]);
        fx.schedule().await;

        let summary = fx.dispatcher().run().await.unwrap();
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn due_records_are_sent_oldest_first() {
        let fx = Fixture::new(100, &["a@example.com", "b@example.com"]);
        let key = fx.schedule().await;
        fx.make_all_due(&key);

        let summary = fx.dispatcher().run().await.unwrap();
        assert_eq!(summary.claimed, 2);
        assert_eq!(summary.sent, 2);

        let records = fx.records_by_key(&key);
        for record in &records {
            assert_eq!(record.status, DispatchStatus::Sent);
            assert!(record.provider_message_id.is_some());
        }
        assert_eq!(
            fx.mail.sent_drafts(),
            records
                .iter()
                .map(|r| r.provider_draft_id.clone().unwrap())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn sent_records_are_not_reclaimed() {
        let fx = Fixture::new(100, &["a@example.com"]);
        let key = fx.schedule().await;
        fx.make_all_due(&key);

        let dispatcher = fx.dispatcher();
        assert_eq!(dispatcher.run().await.unwrap().sent, 1);

        let second = dispatcher.run().await.unwrap();
        assert_eq!(second.claimed, 0);
        assert_eq!(fx.mail.sent_drafts().len(), 1);
    }

    #[tokio::test]
    async fn provider_failure_marks_failed_with_reason() {
        // The failing record is due first; the run must still reach the
        // second one.
        let fx = Fixture::new(100, &["bad@example.com", "ok@example.com"]);
        let key = fx.schedule().await;
        fx.make_all_due(&key);
        fx.mail.fail_send_to("bad@example.com");

        let summary = fx.dispatcher().run().await.unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);

        let failed: Vec<_> = fx
            .records_by_key(&key)
            .into_iter()
            .filter(|r| r.status == DispatchStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].recipient_email, "bad@example.com");
        assert!(failed[0].failure_reason.as_deref().unwrap().contains("send rejected"));
    }

    #[tokio::test]
    async fn daily_cap_skips_the_remainder() {
        let fx = Fixture::with_dispatch_config(
            100,
            &["a@example.com", "b@example.com", "c@example.com"],
            DispatchConfig {
                daily_send_cap: 2,
                ..DispatchConfig::default()
            },
        );
        let key = fx.schedule().await;
        fx.make_all_due(&key);

        let summary = fx.dispatcher().run().await.unwrap();
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.skipped, 1);

        let skipped: Vec<_> = fx
            .records_by_key(&key)
            .into_iter()
            .filter(|r| r.status == DispatchStatus::Skipped)
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(
            skipped[0].failure_reason.as_deref(),
            Some("daily cap reached")
        );
    }

    #[tokio::test]
    async fn revoked_account_fails_the_record() {
        let fx = Fixture::new(100, &["a@example.com"]);
        let key = fx.schedule().await;
        fx.make_all_due(&key);
        fx.revoke_account();

        let summary = fx.dispatcher().run().await.unwrap();
        assert_eq!(summary.failed, 1);
        let records = fx.records_by_key(&key);
        assert_eq!(records[0].status, DispatchStatus::Failed);
        assert_eq!(
            records[0].failure_reason.as_deref(),
            Some("account revoked")
        );
    }

    #[tokio::test]
    async fn batch_size_bounds_a_run() {
        let fx = Fixture::with_dispatch_config(
            1000,
            &[
                "a@example.com",
                "b@example.com",
                "c@example.com",
                "d@example.com",
            ],
            DispatchConfig {
                batch_size: 3,
                ..DispatchConfig::default()
            },
        );
        let key = fx.schedule().await;
        fx.make_all_due(&key);

        let dispatcher = fx.dispatcher();
        assert_eq!(dispatcher.run().await.unwrap().claimed, 3);
        assert_eq!(dispatcher.run().await.unwrap().claimed, 1);
    }

    #[tokio::test]
    async fn dispatch_leaves_the_campaign_row_alone() {
        let fx = Fixture::new(100, &["ok@example.com", "bad@example.com"]);
        let key = fx.schedule().await;
        fx.make_all_due(&key);
        fx.mail.fail_send_to("bad@example.com");

        fx.dispatcher().run().await.unwrap();

        // Outcomes live on the dispatch records; campaign status and
        // counters stay whatever the scheduler last wrote.
        let campaign = fx.campaign();
        assert_eq!(campaign.status, CampaignStatus::Scheduled);
        assert_eq!(campaign.scheduled_count, 2);
        assert_eq!(campaign.sent_count, 0);
        assert_eq!(campaign.failed_count, 0);
    }
}
