//! Campaign and recipient list types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CampaignId, ListId, TemplateId, UserId};

/// An outreach campaign: one template sent to one recipient list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique campaign ID.
    pub id: CampaignId,

    /// Owning user.
    pub user_id: UserId,

    /// Display name.
    pub name: String,

    /// The template whose subject/body are sent.
    pub template_id: TemplateId,

    /// Lifecycle state. Transitions are driven only by the scheduler.
    pub status: CampaignStatus,

    /// Where the recipients come from.
    pub recipient_source: RecipientSource,

    /// The recipient list, when `recipient_source` is `List`.
    pub recipient_list_id: Option<ListId>,

    /// Number of dispatch records created for this campaign.
    pub scheduled_count: u64,

    /// Number of records that reached `sent`.
    pub sent_count: u64,

    /// Number of records that reached `failed`.
    pub failed_count: u64,

    /// When the campaign was created.
    pub created_at: DateTime<Utc>,

    /// When the campaign was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a draft campaign over a recipient list.
    #[must_use]
    pub fn new(user_id: UserId, name: String, template_id: TemplateId, list_id: ListId) -> Self {
        let now = Utc::now();
        Self {
            id: CampaignId::generate(),
            user_id,
            name,
            template_id,
            status: CampaignStatus::Draft,
            recipient_source: RecipientSource::List,
            recipient_list_id: Some(list_id),
            scheduled_count: 0,
            sent_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the campaign may be scheduled from its current state.
    #[must_use]
    pub const fn is_schedulable(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Paused)
    }
}

/// Campaign lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created but never scheduled.
    Draft,

    /// Dispatch records exist and are being worked off.
    Scheduled,

    /// Scheduling suspended; may be re-scheduled.
    Paused,

    /// All records reached a terminal state.
    Completed,
}

/// Where a campaign's recipients come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientSource {
    /// A user-owned recipient list.
    List,

    /// System-curated recipients.
    System,
}

/// A user-owned, ordered list of recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientList {
    /// Unique list ID.
    pub id: ListId,

    /// Owning user.
    pub user_id: UserId,

    /// Display name.
    pub name: String,

    /// When the list was created.
    pub created_at: DateTime<Utc>,
}

impl RecipientList {
    /// Create an empty list.
    #[must_use]
    pub fn new(user_id: UserId, name: String) -> Self {
        Self {
            id: ListId::generate(),
            user_id,
            name,
            created_at: Utc::now(),
        }
    }
}

/// One recipient in a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Raw address from the upload.
    pub email: String,

    /// Enrichment-chosen address, preferred over `email` when present.
    pub chosen_email: Option<String>,

    /// Display name, when known.
    pub name: Option<String>,
}

impl Recipient {
    /// Create a recipient from a raw address.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            chosen_email: None,
            name: None,
        }
    }

    /// The address actually used for sending and suppression checks.
    #[must_use]
    pub fn effective_email(&self) -> &str {
        self.chosen_email.as_deref().unwrap_or(&self.email)
    }
}
