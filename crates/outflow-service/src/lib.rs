//! Outflow HTTP API service.
//!
//! This crate provides the HTTP boundary over the outflow engines:
//!
//! - Credit balance, ledger history, and credit grants
//! - Campaign scheduling previews and scheduling
//! - On-demand dispatcher ticks and the dead-letter queue
//!
//! Caller identity comes from an `x-user-id` header stamped by an upstream
//! gateway; this service performs no authentication of its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for the router signature

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod providers;
pub mod routes;
pub mod state;
pub mod tasks;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use providers::{InMemoryTemplates, LocalMailProvider, TracingAuditLog};
pub use routes::create_router;
pub use state::AppState;
