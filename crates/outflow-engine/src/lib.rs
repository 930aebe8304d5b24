//! Business engines for the outflow service: the credit ledger, the
//! campaign scheduler, the send dispatcher, and the dead-letter recorder.
//!
//! Engines own semantics and invariants; persistence lives behind the
//! [`outflow_store::Store`] trait and provider integrations behind the
//! collaborator traits in [`providers`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod deadletter;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod providers;
pub mod rate_limit;
pub mod referrals;
pub mod scheduler;
pub mod suppression;

#[cfg(test)]
pub(crate) mod testutil;

pub use deadletter::DeadLetterRecorder;
pub use dispatcher::{DispatchSummary, SendDispatcher};
pub use error::{EngineError, Result};
pub use ledger::LedgerEngine;
pub use providers::{
    AccessToken, AuditLog, EmailTemplate, MailProvider, NoopAuditLog, ProviderError, TemplateStore,
};
pub use rate_limit::SendRateLimiter;
pub use referrals::ReferralRewards;
pub use scheduler::{CampaignScheduler, SchedulePreview, ScheduleReceipt};
pub use suppression::{StoreSuppressionFilter, SuppressionFilter};
