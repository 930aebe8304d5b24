//! Core types for the outflow outreach platform.
//!
//! This crate provides the foundational types used throughout outflow:
//!
//! - **Identifiers**: `UserId`, `CampaignId`, `AccountId`, `EntryId`, ...
//! - **Ledger**: `Balance`, `LedgerEntry`, `EntryReason`
//! - **Campaigns**: `Campaign`, `RecipientList`, `Recipient`
//! - **Dispatch**: `DispatchRecord`, `DispatchStatus`
//! - **Suppression**: `SuppressionEntry`
//! - **Dead letters**: `DeadLetterRecord`
//! - **Configuration**: `PricingConfig`, `DispatchConfig`
//!
//! # Credits
//!
//! A credit is the product's internal currency: one unit of chargeable
//! usage, stored as `i64` (whole credits only). Ledger amounts are signed:
//! positive = credit, negative = debit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod campaign;
pub mod config;
pub mod deadletter;
pub mod dispatch;
pub mod ids;
pub mod ledger;
pub mod suppression;

pub use account::{SendingAccount, UserRecord};
pub use campaign::{Campaign, CampaignStatus, Recipient, RecipientList, RecipientSource};
pub use config::{DispatchConfig, PricingConfig};
pub use deadletter::{DeadLetterRecord, DEAD_LETTER_REASON_MAX_LEN};
pub use dispatch::{DispatchRecord, DispatchStatus, FAILURE_REASON_MAX_LEN};
pub use ids::{
    AccountId, CampaignId, DispatchId, EntryId, IdError, ListId, TemplateId, UserId,
};
pub use ledger::{Balance, EntryReason, InvalidReason, LedgerEntry};
pub use suppression::{normalize_email, SuppressionEntry};
