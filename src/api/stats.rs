//! Stats endpoint.

use axum::extract::State;

use super::{error, revision, success, ApiResult};
use crate::models::Stats;
use crate::store::EnrollmentStore;
use crate::AppState;

/// GET /api/stats - Topic and response counts for the progress view.
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Stats> {
    let revision_id = revision(&state).await;

    match state.store.stats().await {
        Ok(stats) => success(stats, revision_id),
        Err(e) => error(e, revision_id),
    }
}
