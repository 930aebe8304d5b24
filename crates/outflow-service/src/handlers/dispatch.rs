//! Dispatcher and dead-letter handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use outflow_core::DeadLetterRecord;
use outflow_engine::DispatchSummary;

use crate::error::ApiError;
use crate::state::AppState;

/// Run one dispatcher tick on demand.
///
/// Returns an empty summary when a background tick is already in flight.
pub async fn run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DispatchSummary>, ApiError> {
    let summary = state
        .dead_letters
        .run(
            "dispatch_due_sends",
            serde_json::json!({ "trigger": "http" }),
            state.dispatcher.run(),
        )
        .await?;
    Ok(Json(summary))
}

/// Dead-letter list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListDeadLettersQuery {
    /// Maximum number of records to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// One dead-lettered job.
#[derive(Debug, Serialize)]
pub struct DeadLetterResponse {
    /// Name of the job that failed.
    pub job_name: String,
    /// Job id.
    pub job_id: String,
    /// Arguments the job was invoked with.
    pub args: serde_json::Value,
    /// Failure reason.
    pub reason: String,
    /// Retries attempted before capture.
    pub retries: u32,
    /// Timestamp.
    pub created_at: String,
}

impl From<&DeadLetterRecord> for DeadLetterResponse {
    fn from(record: &DeadLetterRecord) -> Self {
        Self {
            job_name: record.job_name.clone(),
            job_id: record.job_id.clone(),
            args: record.args.clone(),
            reason: record.reason.clone(),
            retries: record.retries,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Dead-letter list response.
#[derive(Debug, Serialize)]
pub struct ListDeadLettersResponse {
    /// Records, newest first.
    pub dead_letters: Vec<DeadLetterResponse>,
}

/// List dead-lettered jobs, newest first.
pub async fn list_dead_letters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListDeadLettersQuery>,
) -> Result<Json<ListDeadLettersResponse>, ApiError> {
    let records = state.store.list_dead_letters(query.limit.min(100))?;
    Ok(Json(ListDeadLettersResponse {
        dead_letters: records.iter().map(DeadLetterResponse::from).collect(),
    }))
}
