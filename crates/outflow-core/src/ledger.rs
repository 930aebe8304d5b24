//! Ledger types: per-user balances and the append-only entry log.
//!
//! Every change to a user's credit balance creates a `LedgerEntry`. The
//! entry carries a `balance_after` snapshot, so the most recent entry for a
//! user always agrees with the user's current `Balance`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{EntryId, UserId};

/// Current credit balance for one user.
///
/// Created lazily on a user's first ledger entry and only ever mutated
/// together with an entry append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    /// The user this balance belongs to.
    pub user_id: UserId,

    /// Current balance in credits. Never negative.
    pub amount: i64,

    /// When the balance was last written.
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create a zero balance for a user.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            amount: 0,
            updated_at: Utc::now(),
        }
    }
}

/// An immutable, append-only ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Amount in credits. Positive = credit, negative = debit.
    pub amount: i64,

    /// Balance after this entry was applied.
    pub balance_after: i64,

    /// Why the entry was created.
    pub reason: EntryReason,

    /// Kind of the referenced entity (`"campaign"`, `"payment"`, ...).
    pub reference_type: Option<String>,

    /// Identifier of the referenced entity.
    pub reference_id: Option<String>,

    /// Caller-supplied idempotency key. At most one entry exists per
    /// `(user_id, idempotency_key)` pair with a non-null key.
    pub idempotency_key: Option<String>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a new entry with a generated id and the current timestamp.
    #[must_use]
    pub fn new(
        user_id: UserId,
        amount: i64,
        balance_after: i64,
        reason: EntryReason,
        reference: Option<(String, String)>,
        idempotency_key: Option<String>,
    ) -> Self {
        let (reference_type, reference_id) = match reference {
            Some((t, i)) => (Some(t), Some(i)),
            None => (None, None),
        };
        Self {
            id: EntryId::generate(),
            user_id,
            amount,
            balance_after,
            reason,
            reference_type,
            reference_id,
            idempotency_key,
            created_at: Utc::now(),
        }
    }
}

/// The fixed set of reasons a ledger entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryReason {
    /// Signup bonus credited once on onboarding.
    OnboardingBonus,

    /// User purchased credits (payment provider result).
    Purchase,

    /// Debit for scheduling a campaign.
    Schedule,

    /// Debit for an email verification.
    Verify,

    /// Debit for a resume scan.
    ResumeScan,

    /// Refund issued.
    Refund,

    /// Referral reward credited to a referrer.
    Referral,
}

impl EntryReason {
    /// Get the reason as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OnboardingBonus => "onboarding_bonus",
            Self::Purchase => "purchase",
            Self::Schedule => "schedule",
            Self::Verify => "verify",
            Self::ResumeScan => "resume_scan",
            Self::Refund => "refund",
            Self::Referral => "referral",
        }
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryReason {
    type Err = InvalidReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding_bonus" => Ok(Self::OnboardingBonus),
            "purchase" => Ok(Self::Purchase),
            "schedule" => Ok(Self::Schedule),
            "verify" => Ok(Self::Verify),
            "resume_scan" => Ok(Self::ResumeScan),
            "refund" => Ok(Self::Refund),
            "referral" => Ok(Self::Referral),
            other => Err(InvalidReason(other.to_string())),
        }
    }
}

/// Error returned when a reason string is not one of the fixed enum values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ledger reason: {0}")]
pub struct InvalidReason(pub String);
