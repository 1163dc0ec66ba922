//! Enrollment window endpoint.

use axum::extract::State;
use chrono::Utc;

use super::{revision, success, ApiResult};
use crate::models::WindowStatus;
use crate::AppState;

/// GET /api/window - Phase, countdown and bounds of the enrollment window.
pub async fn get_window(State(state): State<AppState>) -> ApiResult<WindowStatus> {
    let revision_id = revision(&state).await;
    success(state.store.window().status(Utc::now()), revision_id)
}
