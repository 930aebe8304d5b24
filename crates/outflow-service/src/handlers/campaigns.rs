//! Campaign preview and scheduling handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use outflow_core::CampaignId;

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

/// Preview response.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Recipients remaining after suppression filtering.
    pub recipient_count: u64,
    /// Credits the schedule would cost.
    pub credits_required: i64,
    /// Price per outbound message.
    pub credits_per_send: i64,
}

/// Preview recipient count and cost before scheduling.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(campaign_id): Path<CampaignId>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let preview = state.scheduler.preview(&campaign_id, &caller.user_id).await?;
    Ok(Json(PreviewResponse {
        recipient_count: preview.recipient_count,
        credits_required: preview.credits_required,
        credits_per_send: preview.credits_per_send,
    }))
}

/// Schedule request.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    /// Optional idempotency key; retries with the same key return the
    /// original receipt without charging again.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Schedule response.
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    /// Dispatch records created (or previously created, on replay).
    pub dispatched_count: u64,
    /// The key guarding this schedule against retries.
    pub idempotency_key: String,
}

/// Charge credits and schedule the campaign's sends.
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(campaign_id): Path<CampaignId>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let receipt = state
        .scheduler
        .schedule(&campaign_id, &caller.user_id, request.idempotency_key)
        .await?;
    Ok(Json(ScheduleResponse {
        dispatched_count: receipt.dispatched_count,
        idempotency_key: receipt.idempotency_key,
    }))
}
