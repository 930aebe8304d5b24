//! Local collaborator implementations.
//!
//! The engines speak to the outside world through traits; this module
//! supplies the in-process implementations the service wires in when no
//! external integration is configured. The mail provider fabricates draft
//! and message ids and logs instead of calling a real API, which keeps the
//! whole pipeline runnable end to end.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use outflow_core::{AccountId, SendingAccount, TemplateId, UserId};
use outflow_engine::{
    AccessToken, AuditLog, EmailTemplate, MailProvider, ProviderError, TemplateStore,
};

/// A provider that simulates drafting and sending locally.
#[derive(Default)]
pub struct LocalMailProvider;

#[async_trait]
impl MailProvider for LocalMailProvider {
    async fn valid_credential(
        &self,
        account: &SendingAccount,
    ) -> Result<AccessToken, ProviderError> {
        if account.revoked {
            return Err(ProviderError(format!(
                "account {} has a revoked grant",
                account.id
            )));
        }
        Ok(AccessToken(format!("local-{}", account.id)))
    }

    async fn create_draft(
        &self,
        _token: &AccessToken,
        account_id: &AccountId,
        to: &str,
        subject: &str,
        _body_html: &str,
    ) -> Result<String, ProviderError> {
        let draft_id = format!("draft-{}", uuid::Uuid::new_v4());
        tracing::debug!(
            account_id = %account_id,
            recipient = %to,
            subject = %subject,
            draft_id = %draft_id,
            "Draft created locally"
        );
        Ok(draft_id)
    }

    async fn send_draft(
        &self,
        _token: &AccessToken,
        account_id: &AccountId,
        draft_id: &str,
    ) -> Result<String, ProviderError> {
        let message_id = format!("msg-{}", uuid::Uuid::new_v4());
        tracing::info!(
            account_id = %account_id,
            draft_id = %draft_id,
            message_id = %message_id,
            "Message sent locally"
        );
        Ok(message_id)
    }
}

/// An in-memory template catalog, keyed by template and owner.
#[derive(Default)]
pub struct InMemoryTemplates {
    templates: Mutex<HashMap<(TemplateId, UserId), EmailTemplate>>,
}

impl InMemoryTemplates {
    /// Register a template for an owner.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, template_id: TemplateId, owner: UserId, template: EmailTemplate) {
        self.templates
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((template_id, owner), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplates {
    async fn get(
        &self,
        template_id: &TemplateId,
        user_id: &UserId,
    ) -> Result<Option<EmailTemplate>, ProviderError> {
        Ok(self
            .templates
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&(*template_id, *user_id))
            .cloned())
    }
}

/// An audit log that emits structured trace events.
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(
        &self,
        user_id: &UserId,
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        metadata: serde_json::Value,
    ) {
        tracing::info!(
            user_id = %user_id,
            event_type = %event_type,
            entity_type = %entity_type,
            entity_id = %entity_id,
            metadata = %metadata,
            "Audit event"
        );
    }
}
