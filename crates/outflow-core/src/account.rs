//! User and sending-account records.
//!
//! User identity (auth, sessions) is owned by an external layer; outflow
//! keeps the minimal record it needs for ledger existence checks and
//! referral rewards. A `SendingAccount` references the external mail
//! provider account a campaign sends through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, UserId};

/// Minimal user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user ID.
    pub id: UserId,

    /// Primary email address.
    pub email: String,

    /// This user's own referral code, when generated.
    pub referral_code: Option<String>,

    /// The user who referred this one, when a code was applied.
    pub referred_by: Option<UserId>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Create a user record.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            referral_code: None,
            referred_by: None,
            created_at: Utc::now(),
        }
    }
}

/// A connected mail-provider account.
///
/// Token storage and OAuth refresh live behind the `MailProvider`
/// collaborator; this record only tracks ownership and revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingAccount {
    /// Unique account ID.
    pub id: AccountId,

    /// Owning user.
    pub user_id: UserId,

    /// The provider-side address this account sends as.
    pub email: String,

    /// Whether the provider grant has been revoked. Revoked accounts are
    /// never used for scheduling or sending.
    pub revoked: bool,

    /// When the account was connected.
    pub created_at: DateTime<Utc>,
}

impl SendingAccount {
    /// Create a connected (non-revoked) account.
    #[must_use]
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            id: AccountId::generate(),
            user_id,
            email: email.into(),
            revoked: false,
            created_at: Utc::now(),
        }
    }
}
