//! Dispatch records: one planned or sent outbound message per recipient.
//!
//! Records are created in bulk by the scheduler (status `drafted`) and from
//! then on mutated only by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, CampaignId, DispatchId};

/// Maximum stored length of a dispatch failure reason.
pub const FAILURE_REASON_MAX_LEN: usize = 500;

/// One planned/sent outbound message derived from a campaign and a recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Unique record ID (ULID for time-ordering).
    pub id: DispatchId,

    /// The campaign this message belongs to.
    pub campaign_id: CampaignId,

    /// The external-provider account used for the send.
    pub account_id: AccountId,

    /// Recipient address (the effective address at scheduling time).
    pub recipient_email: String,

    /// Message subject.
    pub subject: String,

    /// Fully rendered body (template + compliance footer).
    pub rendered_body: String,

    /// When the message becomes due.
    pub send_at: DateTime<Utc>,

    /// Current state.
    pub status: DispatchStatus,

    /// Provider-side draft id created at scheduling time.
    pub provider_draft_id: Option<String>,

    /// Provider-side message id, set once sent.
    pub provider_message_id: Option<String>,

    /// Idempotency key shared by all records from one scheduling call.
    pub idempotency_key: String,

    /// Why the record failed or was skipped, truncated to
    /// [`FAILURE_REASON_MAX_LEN`].
    pub failure_reason: Option<String>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl DispatchRecord {
    /// Create a drafted record ready for the dispatcher.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn drafted(
        campaign_id: CampaignId,
        account_id: AccountId,
        recipient_email: String,
        subject: String,
        rendered_body: String,
        send_at: DateTime<Utc>,
        provider_draft_id: String,
        idempotency_key: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DispatchId::generate(),
            campaign_id,
            account_id,
            recipient_email,
            subject,
            rendered_body,
            send_at,
            status: DispatchStatus::Drafted,
            provider_draft_id: Some(provider_draft_id),
            provider_message_id: None,
            idempotency_key,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `sent` with the provider message id.
    pub fn mark_sent(&mut self, message_id: String) {
        self.status = DispatchStatus::Sent;
        self.provider_message_id = Some(message_id);
        self.failure_reason = None;
        self.updated_at = Utc::now();
    }

    /// Transition to `failed` with a truncated reason.
    pub fn mark_failed(&mut self, reason: &str) {
        self.status = DispatchStatus::Failed;
        self.failure_reason = Some(truncate_reason(reason));
        self.updated_at = Utc::now();
    }

    /// Transition to `skipped` with a truncated reason.
    ///
    /// Skipped is not a failure; the record is eligible for a later
    /// re-schedule but is never retried automatically.
    pub fn mark_skipped(&mut self, reason: &str) {
        self.status = DispatchStatus::Skipped;
        self.failure_reason = Some(truncate_reason(reason));
        self.updated_at = Utc::now();
    }
}

/// State of a dispatch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Created but no provider draft exists yet.
    Queued,

    /// Provider draft created; waiting for `send_at`.
    Drafted,

    /// Claimed by a dispatcher run; a crash here leaves the record visibly
    /// stuck rather than silently re-queued.
    Sending,

    /// Delivered to the provider.
    Sent,

    /// Send failed; never retried automatically.
    Failed,

    /// Passed over (daily cap); eligible for a later re-schedule.
    Skipped,
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= FAILURE_REASON_MAX_LEN {
        return reason.to_string();
    }
    // Truncate on a char boundary at or below the cap.
    let mut end = FAILURE_REASON_MAX_LEN;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}
