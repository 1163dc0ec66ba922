//! Claim endpoint: the topic-claim transaction over HTTP.

use axum::{extract::State, Json};

use super::{error, revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{ClaimOutcome, ClaimRequest, EnrollmentRecord};
use crate::store::EnrollmentStore;
use crate::AppState;

/// POST /api/claims - Claim a topic for a team of two.
///
/// A committed claim returns the stored record. Aborts come back as error envelopes whose
/// code names the reason (`ALREADY_CLAIMED`, `TOPIC_NOT_FOUND`, `DUPLICATE_IDENTIFIER`,
/// `WINDOW_CLOSED`).
pub async fn claim_topic(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<EnrollmentRecord> {
    let revision_id = revision(&state).await;

    match state.store.claim_topic(&request).await {
        Ok(ClaimOutcome::Committed(record)) => {
            let new_revision = revision(&state).await;
            success(record, new_revision)
        }
        Ok(ClaimOutcome::Aborted(reason)) => error(AppError::ClaimAborted(reason), revision_id),
        Err(e) => error(e, revision_id),
    }
}
