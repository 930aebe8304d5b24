//! External collaborator interfaces.
//!
//! The mail provider's OAuth/token mechanics, template CRUD, and audit
//! persistence are external to the core; these traits define exactly what
//! the scheduler and dispatcher need from them.

use async_trait::async_trait;

use outflow_core::{AccountId, SendingAccount, TemplateId, UserId};

pub use crate::error::ProviderError;

/// An opaque, short-lived credential for provider calls.
///
/// The provider implementation handles refresh internally; callers obtain a
/// fresh token per batch item and never cache it.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// The outbound mail provider (drafts and sends).
#[async_trait]
pub trait MailProvider: Send + Sync {
    /// Obtain a valid credential for an account, refreshing if expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the grant is invalid or refresh fails.
    async fn valid_credential(&self, account: &SendingAccount)
        -> Result<AccessToken, ProviderError>;

    /// Create a provider-side draft; returns the draft id.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the draft.
    async fn create_draft(
        &self,
        token: &AccessToken,
        account_id: &AccountId,
        to: &str,
        subject: &str,
        body_html: &str,
    ) -> Result<String, ProviderError>;

    /// Send a previously created draft; returns the provider message id.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails. The caller treats this as a
    /// per-record failure, never a batch abort.
    async fn send_draft(
        &self,
        token: &AccessToken,
        account_id: &AccountId,
        draft_id: &str,
    ) -> Result<String, ProviderError>;
}

/// An email template resolved at scheduling time.
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    /// Message subject.
    pub subject: String,

    /// HTML body before the footer is appended.
    pub body_html: String,

    /// Compliance footer appended to every rendered body.
    pub footer: String,
}

/// Read access to the (externally managed) template catalog.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch a template owned by `user_id`; `None` when missing or owned
    /// by someone else.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is unreachable.
    async fn get(
        &self,
        template_id: &TemplateId,
        user_id: &UserId,
    ) -> Result<Option<EmailTemplate>, ProviderError>;
}

/// Fire-and-forget audit trail. Failures must never abort the caller.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an audit event.
    async fn record(
        &self,
        user_id: &UserId,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    );
}

/// An [`AuditLog`] that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

#[async_trait]
impl AuditLog for NoopAuditLog {
    async fn record(
        &self,
        _user_id: &UserId,
        _event_type: &str,
        _entity_type: &str,
        _entity_id: &str,
        _metadata: serde_json::Value,
    ) {
    }
}
