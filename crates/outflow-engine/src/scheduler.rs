//! The campaign scheduler: prices a scheduling request, debits the ledger,
//! and materializes one dispatch record per eligible recipient.
//!
//! Scheduling is the only write path for campaign status and counters and
//! the only creator of dispatch records. Retries are guarded twice: the
//! ledger's idempotency key prevents double charging, and an independent
//! check for existing dispatch records under the same key prevents double
//! creation (the ledger alone cannot).

use std::sync::Arc;

use chrono::Utc;

use outflow_core::{
    Campaign, CampaignId, CampaignStatus, DispatchConfig, DispatchRecord, EntryReason,
    PricingConfig, Recipient, RecipientSource, SendingAccount, UserId,
};
use outflow_store::Store;

use crate::error::{EngineError, Result};
use crate::ledger::LedgerEngine;
use crate::providers::{AuditLog, EmailTemplate, MailProvider, TemplateStore};
use crate::referrals::ReferralRewards;
use crate::suppression::SuppressionFilter;

/// Result of a scheduling preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePreview {
    /// Recipients remaining after suppression filtering.
    pub recipient_count: u64,

    /// Credits the schedule would cost.
    pub credits_required: i64,

    /// Price per outbound message.
    pub credits_per_send: i64,
}

/// Result of a scheduling call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleReceipt {
    /// Dispatch records created (or previously created, on replay).
    pub dispatched_count: u64,

    /// The key guarding this logical operation against retries.
    pub idempotency_key: String,
}

/// Prices, charges, and materializes campaign sends.
pub struct CampaignScheduler {
    store: Arc<dyn Store>,
    ledger: Arc<LedgerEngine>,
    referrals: ReferralRewards,
    mail: Arc<dyn MailProvider>,
    templates: Arc<dyn TemplateStore>,
    suppression: Arc<dyn SuppressionFilter>,
    audit: Arc<dyn AuditLog>,
    pricing: PricingConfig,
    dispatch: DispatchConfig,
}

impl CampaignScheduler {
    /// Create a scheduler.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        ledger: Arc<LedgerEngine>,
        mail: Arc<dyn MailProvider>,
        templates: Arc<dyn TemplateStore>,
        suppression: Arc<dyn SuppressionFilter>,
        audit: Arc<dyn AuditLog>,
        pricing: PricingConfig,
        dispatch: DispatchConfig,
    ) -> Self {
        let referrals = ReferralRewards::new(Arc::clone(&store), Arc::clone(&ledger), &pricing);
        Self {
            store,
            ledger,
            referrals,
            mail,
            templates,
            suppression,
            audit,
            pricing,
            dispatch,
        }
    }

    /// Recipient count and credit estimate for scheduling. Read-only.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the campaign does not exist or is not
    ///   owned by `user_id`.
    /// - [`EngineError::BadRequest`] if the recipient list is missing.
    pub async fn preview(&self, campaign_id: &CampaignId, user_id: &UserId) -> Result<SchedulePreview> {
        let campaign = self.resolve_campaign(campaign_id, user_id)?;
        let recipients = self.eligible_recipients(&campaign, user_id).await?;

        #[allow(clippy::cast_possible_truncation)]
        let recipient_count = recipients.len() as u64;
        #[allow(clippy::cast_possible_wrap)]
        let credits_required = recipient_count as i64 * self.pricing.credits_per_send;
        Ok(SchedulePreview {
            recipient_count,
            credits_required,
            credits_per_send: self.pricing.credits_per_send,
        })
    }

    /// Charge credits and create one drafted dispatch record per eligible
    /// recipient, staggered from one minute out.
    ///
    /// Retrying with the same `idempotency_key` returns the original
    /// receipt: the ledger debit replays without charging and no new
    /// records are created. The replay guard keys off existing dispatch
    /// records, so a first attempt that charged but drafted zero records
    /// leaves nothing to recognize a retry by; the retry then fails the
    /// status precondition like any other call.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidState`] if the campaign is not in
    ///   `draft`/`paused`.
    /// - [`EngineError::BadRequest`] if the template, connected account, or
    ///   list is missing, the account is revoked, or no eligible recipients
    ///   remain.
    /// - [`EngineError::InsufficientCredits`] if the balance cannot cover
    ///   the charge; nothing is created.
    pub async fn schedule(
        &self,
        campaign_id: &CampaignId,
        user_id: &UserId,
        idempotency_key: Option<String>,
    ) -> Result<ScheduleReceipt> {
        let mut campaign = self.resolve_campaign(campaign_id, user_id)?;

        // A retry with a known key must return the original receipt even
        // though the first attempt already moved the campaign out of draft.
        if let Some(key) = &idempotency_key {
            let existing = self.store.count_dispatch_records_by_key(key)?;
            if existing > 0 {
                tracing::info!(
                    campaign_id = %campaign_id,
                    idempotency_key = %key,
                    dispatched_count = %existing,
                    "Schedule replayed; dispatch records already exist"
                );
                return Ok(ScheduleReceipt {
                    dispatched_count: existing,
                    idempotency_key: key.clone(),
                });
            }
        }

        if !campaign.is_schedulable() {
            return Err(EngineError::InvalidState(format!(
                "campaign cannot be scheduled from {:?}",
                campaign.status
            )));
        }

        let template = self
            .templates
            .get(&campaign.template_id, user_id)
            .await
            .map_err(|e| EngineError::Provider(e.0))?
            .ok_or_else(|| EngineError::BadRequest("template not found".into()))?;

        let account = self
            .store
            .account_for_user(user_id)?
            .ok_or_else(|| EngineError::BadRequest("no connected sending account".into()))?;

        let recipients = self.eligible_recipients(&campaign, user_id).await?;
        if recipients.is_empty() {
            return Err(EngineError::BadRequest("no eligible recipients".into()));
        }

        let key = idempotency_key.unwrap_or_else(generate_idempotency_key);

        #[allow(clippy::cast_possible_wrap)]
        let price = recipients.len() as i64 * self.pricing.credits_per_send;
        self.ledger
            .apply_entry(
                *user_id,
                -price,
                EntryReason::Schedule,
                Some(("campaign".into(), campaign_id.to_string())),
                Some(key.clone()),
            )
            .await?;

        // The ledger's idempotency only guards the charge; records created
        // by an earlier attempt must not be created again.
        let existing = self.store.count_dispatch_records_by_key(&key)?;
        if existing > 0 {
            tracing::info!(
                campaign_id = %campaign_id,
                idempotency_key = %key,
                dispatched_count = %existing,
                "Schedule replayed; dispatch records already exist"
            );
            return Ok(ScheduleReceipt {
                dispatched_count: existing,
                idempotency_key: key,
            });
        }

        let created = self
            .create_dispatch_records(&campaign, &account, &template, &recipients, &key)
            .await?;

        campaign.scheduled_count += created;
        campaign.status = CampaignStatus::Scheduled;
        campaign.updated_at = Utc::now();
        self.store.put_campaign(&campaign)?;

        tracing::info!(
            campaign_id = %campaign_id,
            user_id = %user_id,
            dispatched_count = %created,
            credits_charged = %price,
            "Campaign scheduled"
        );

        self.audit
            .record(
                user_id,
                "campaign_scheduled",
                "campaign",
                &campaign_id.to_string(),
                serde_json::json!({ "scheduled_count": created }),
            )
            .await;

        if let Err(e) = self.referrals.grant_if_eligible(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Referral reward evaluation failed");
        }

        Ok(ScheduleReceipt {
            dispatched_count: created,
            idempotency_key: key,
        })
    }

    /// Create drafted records for each recipient, in list order, with
    /// `send_at` staggered per successful draft.
    ///
    /// Recipients whose provider draft fails are skipped silently: not
    /// retried, not counted, never fatal to the batch.
    async fn create_dispatch_records(
        &self,
        campaign: &Campaign,
        account: &SendingAccount,
        template: &EmailTemplate,
        recipients: &[Recipient],
        idempotency_key: &str,
    ) -> Result<u64> {
        let token = self.mail.valid_credential(account).await?;
        let body = inject_footer(&template.body_html, &template.footer);

        let mut send_at = Utc::now() + self.dispatch.initial_delay;
        let mut records = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let to = recipient.effective_email();
            let draft_id = match self
                .mail
                .create_draft(&token, &account.id, to, &template.subject, &body)
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    tracing::debug!(
                        campaign_id = %campaign.id,
                        recipient = %to,
                        error = %e,
                        "Draft creation failed; recipient skipped"
                    );
                    continue;
                }
            };

            records.push(DispatchRecord::drafted(
                campaign.id,
                account.id,
                to.to_string(),
                template.subject.clone(),
                body.clone(),
                send_at,
                draft_id,
                idempotency_key.to_string(),
            ));
            send_at += self.dispatch.stagger;
        }

        self.store.insert_dispatch_records(&records)?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(records.len() as u64)
    }

    fn resolve_campaign(&self, campaign_id: &CampaignId, user_id: &UserId) -> Result<Campaign> {
        let campaign = self
            .store
            .get_campaign(campaign_id)?
            .filter(|c| c.user_id == *user_id)
            .ok_or_else(|| EngineError::not_found("campaign", campaign_id))?;
        Ok(campaign)
    }

    /// Resolve the campaign's recipients and drop any whose effective
    /// address is suppressed for this user (checking the raw address too).
    async fn eligible_recipients(
        &self,
        campaign: &Campaign,
        user_id: &UserId,
    ) -> Result<Vec<Recipient>> {
        if campaign.recipient_source != RecipientSource::List {
            return Ok(Vec::new());
        }
        let list_id = campaign
            .recipient_list_id
            .ok_or_else(|| EngineError::BadRequest("campaign has no recipient list".into()))?;
        let list = self
            .store
            .get_recipient_list(&list_id)?
            .filter(|l| l.user_id == *user_id)
            .ok_or_else(|| EngineError::BadRequest("recipient list not found".into()))?;

        let recipients = self
            .store
            .list_recipients(&list.id, self.dispatch.max_recipients)?;
        let suppressed = self.suppression.list_suppressed(user_id).await?;

        Ok(recipients
            .into_iter()
            .filter(|r| {
                !suppressed.contains(&r.email.to_lowercase())
                    && !suppressed.contains(&r.effective_email().to_lowercase())
            })
            .collect())
    }
}

/// Generate a fresh idempotency key for a scheduling call.
#[must_use]
pub fn generate_idempotency_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Append the compliance footer to a body. Empty footers are a no-op.
#[must_use]
pub fn inject_footer(body_html: &str, footer: &str) -> String {
    if footer.is_empty() {
        return body_html.to_string();
    }
    format!("{}\n\n{}", body_html.trim_end(), footer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use outflow_core::DispatchStatus;

    #[test]
    fn footer_is_appended() {
        assert_eq!(inject_footer("<p>Hi</p>\n", "Unsubscribe"), "<p>Hi</p>\n\nUnsubscribe");
        assert_eq!(inject_footer("<p>Hi</p>", ""), "<p>Hi</p>");
    }

    #[tokio::test]
    async fn preview_counts_and_prices() {
        let fx = Fixture::new(100, &["a@example.com", "b@example.com", "c@example.com"]);
        let preview = fx
            .scheduler()
            .preview(&fx.campaign_id, &fx.user_id)
            .await
            .unwrap();
        assert_eq!(preview.recipient_count, 3);
        assert_eq!(preview.credits_required, 15);
        assert_eq!(preview.credits_per_send, 5);
    }

    #[tokio::test]
    async fn suppressed_recipient_excluded_everywhere() {
        let fx = Fixture::new(100, &["keep@example.com", "drop@example.com"]);
        fx.suppress("drop@example.com");

        let scheduler = fx.scheduler();
        let preview = scheduler.preview(&fx.campaign_id, &fx.user_id).await.unwrap();
        assert_eq!(preview.recipient_count, 1);

        let receipt = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();
        assert_eq!(receipt.dispatched_count, 1);

        let due = fx.due_records();
        assert_eq!(due.len(), 0); // None due yet; all send_at in the future
        let created = fx.records_by_key(&receipt.idempotency_key);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient_email, "keep@example.com");
    }

    #[tokio::test]
    async fn insufficient_credits_creates_nothing() {
        // Balance 10, three recipients at 5 credits each.
        let fx = Fixture::new(10, &["a@example.com", "b@example.com", "c@example.com"]);
        let err = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientCredits {
                balance: 10,
                required: 15
            }
        ));
        assert_eq!(fx.balance(), 10);
        assert_eq!(fx.mail.drafts_created(), 0);
    }

    #[tokio::test]
    async fn schedule_charges_and_staggers() {
        let fx = Fixture::new(100, &["a@example.com", "b@example.com", "c@example.com"]);
        let started = Utc::now();
        let receipt = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();

        assert_eq!(receipt.dispatched_count, 3);
        assert_eq!(fx.balance(), 85);

        let records = fx.records_by_key(&receipt.idempotency_key);
        assert_eq!(records.len(), 3);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.status, DispatchStatus::Drafted);
            let offset = (record.send_at - started).num_seconds();
            #[allow(clippy::cast_possible_wrap)]
            let expected = 60 + 30 * i as i64;
            assert!((offset - expected).abs() <= 1, "send_at offset {offset} != {expected}");
        }

        let campaign = fx.campaign();
        assert_eq!(campaign.status, CampaignStatus::Scheduled);
        assert_eq!(campaign.scheduled_count, 3);
    }

    #[tokio::test]
    async fn replay_does_not_double_charge_or_double_create() {
        let fx = Fixture::new(100, &["a@example.com", "b@example.com"]);
        let scheduler = fx.scheduler();

        let first = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, Some("retry-key".into()))
            .await
            .unwrap();
        assert_eq!(first.dispatched_count, 2);
        assert_eq!(fx.balance(), 90);

        // No re-arm needed: the key alone identifies the original attempt.
        let replay = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, Some("retry-key".into()))
            .await
            .unwrap();
        assert_eq!(replay.dispatched_count, 2);
        assert_eq!(fx.balance(), 90);
        assert_eq!(fx.records_by_key("retry-key").len(), 2);
    }

    #[tokio::test]
    async fn failed_draft_is_skipped_silently() {
        let fx = Fixture::new(100, &["ok@example.com", "broken@example.com", "ok2@example.com"]);
        fx.mail.fail_draft_for("broken@example.com");

        let receipt = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();
        assert_eq!(receipt.dispatched_count, 2);

        let records = fx.records_by_key(&receipt.idempotency_key);
        let emails: Vec<_> = records.iter().map(|r| r.recipient_email.as_str()).collect();
        assert_eq!(emails, ["ok@example.com", "ok2@example.com"]);

        // The stagger advances only per successful draft.
        let gap = (records[1].send_at - records[0].send_at).num_seconds();
        assert_eq!(gap, 30);
    }

    #[tokio::test]
    async fn retry_after_all_drafts_failed_hits_the_status_check() {
        let fx = Fixture::new(100, &["broken@example.com"]);
        fx.mail.fail_draft_for("broken@example.com");

        let scheduler = fx.scheduler();
        let receipt = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, Some("key-1".into()))
            .await
            .unwrap();
        assert_eq!(receipt.dispatched_count, 0);

        // No records carry the key, so the retry is indistinguishable from
        // a fresh call against an already scheduled campaign.
        let err = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, Some("key-1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn scheduled_campaign_rejects_reschedule() {
        let fx = Fixture::new(100, &["a@example.com"]);
        let scheduler = fx.scheduler();
        scheduler
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();

        let err = scheduler
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[tokio::test]
    async fn empty_recipient_set_is_bad_request() {
        let fx = Fixture::new(100, &["only@example.com"]);
        fx.suppress("only@example.com");

        let err = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert_eq!(fx.balance(), 100);
    }

    #[tokio::test]
    async fn revoked_account_is_bad_request() {
        let fx = Fixture::new(100, &["a@example.com"]);
        fx.revoke_account();

        let err = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn schedule_grants_referral_reward_once() {
        let fx = Fixture::new(100, &["a@example.com"]);
        let referrer_id = fx.add_referrer();

        fx.scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();
        assert_eq!(fx.balance_of(&referrer_id), 25);
    }

    #[tokio::test]
    async fn chosen_email_preferred_for_send_and_suppression() {
        let fx = Fixture::new(100, &[]);
        fx.add_recipient_with_chosen("raw@example.com", "chosen@example.com");
        fx.add_recipient_with_chosen("raw2@example.com", "chosen2@example.com");
        fx.suppress("chosen2@example.com");

        let receipt = fx
            .scheduler()
            .schedule(&fx.campaign_id, &fx.user_id, None)
            .await
            .unwrap();
        assert_eq!(receipt.dispatched_count, 1);
        let records = fx.records_by_key(&receipt.idempotency_key);
        assert_eq!(records[0].recipient_email, "chosen@example.com");
    }
}
