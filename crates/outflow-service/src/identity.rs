//! Caller identity extraction.
//!
//! The service trusts an upstream gateway to authenticate callers and to
//! stamp the resolved user id onto the request as an `x-user-id` header.
//! Requests without a parseable id are rejected before any handler runs.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use outflow_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    /// The caller's user id.
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let user_id = raw.parse::<UserId>().map_err(|_| ApiError::Unauthorized)?;
        Ok(Self { user_id })
    }
}
