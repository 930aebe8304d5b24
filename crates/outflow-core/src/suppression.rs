//! Suppression entries: addresses excluded from all future sends.
//!
//! Entries are global (`user_id = None`) or scoped to one user. Emails are
//! normalized (trimmed, lowercased) on construction so lookups match
//! regardless of input casing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// One suppressed email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionEntry {
    /// Normalized address.
    pub email: String,

    /// Scope: `None` means global.
    pub user_id: Option<UserId>,

    /// Which subsystem added the entry (`"verification"`, `"bounce"`, ...).
    pub source: String,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl SuppressionEntry {
    /// Create an entry with a normalized address.
    ///
    /// Returns `None` if the address is empty or has no `@` after
    /// normalization.
    #[must_use]
    pub fn new(email: &str, user_id: Option<UserId>, source: impl Into<String>) -> Option<Self> {
        let email = normalize_email(email)?;
        Some(Self {
            email,
            user_id,
            source: source.into(),
            created_at: Utc::now(),
        })
    }
}

/// Trim and lowercase an address; `None` when it cannot be an email.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let e = SuppressionEntry::new("  Bounced@Example.COM ", None, "verification").unwrap();
        assert_eq!(e.email, "bounced@example.com");
        assert!(e.user_id.is_none());
    }

    #[test]
    fn rejects_non_addresses() {
        assert!(SuppressionEntry::new("", None, "verification").is_none());
        assert!(SuppressionEntry::new("not-an-email", None, "verification").is_none());
    }
}
