//! Credit balance and ledger handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use outflow_core::{EntryReason, LedgerEntry};

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub balance: i64,
}

/// Get current credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.get_balance(&caller.user_id)?;
    Ok(Json(BalanceResponse { balance }))
}

/// Ledger list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListLedgerQuery {
    /// Maximum number of entries to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One ledger entry.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Entry ID.
    pub id: String,
    /// Signed credit delta.
    pub amount: i64,
    /// Balance after this entry.
    pub balance_after: i64,
    /// Why the entry was written.
    pub reason: String,
    /// Referenced entity type, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    /// Referenced entity id, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for EntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            amount: entry.amount,
            balance_after: entry.balance_after,
            reason: entry.reason.as_str().to_string(),
            reference_type: entry.reference_type.clone(),
            reference_id: entry.reference_id.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Ledger list response.
#[derive(Debug, Serialize)]
pub struct ListLedgerResponse {
    /// Entries, newest first.
    pub entries: Vec<EntryResponse>,
    /// Whether more entries remain past this page.
    pub has_more: bool,
}

/// List ledger history, newest first.
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(query): Query<ListLedgerQuery>,
) -> Result<Json<ListLedgerResponse>, ApiError> {
    // Fetch one more than requested to determine has_more.
    let limit = query.limit.min(100);
    let entries = state
        .ledger
        .list_entries(&caller.user_id, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let entries: Vec<_> = entries.iter().take(limit).map(EntryResponse::from).collect();

    Ok(Json(ListLedgerResponse { entries, has_more }))
}

/// Credit grant request.
#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    /// Signed credit delta to apply.
    pub amount: i64,
    /// Entry reason (`purchase`, `onboarding_bonus`, ...).
    pub reason: String,
    /// Optional idempotency key; retries with the same key replay the
    /// original entry.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Credit grant response.
#[derive(Debug, Serialize)]
pub struct AddCreditsResponse {
    /// The written (or replayed) entry.
    pub entry: EntryResponse,
    /// Balance after the entry.
    pub balance: i64,
}

/// Apply a credit grant to the caller's ledger.
pub async fn add_credits(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(request): Json<AddCreditsRequest>,
) -> Result<Json<AddCreditsResponse>, ApiError> {
    let reason = request
        .reason
        .parse::<EntryReason>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (entry, balance) = state
        .ledger
        .apply_entry(
            caller.user_id,
            request.amount,
            reason,
            None,
            request.idempotency_key,
        )
        .await?;

    Ok(Json(AddCreditsResponse {
        entry: EntryResponse::from(&entry),
        balance,
    }))
}
