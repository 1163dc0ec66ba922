//! Response (enrollment record) endpoints.

use axum::{extract::State, Json};

use super::{error, revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{EnrollmentRecord, MemberQuery};
use crate::store::EnrollmentStore;
use crate::AppState;

/// Upper bound on identifiers in one membership query.
const MAX_QUERY_USNS: usize = 30;

/// GET /api/responses - All committed records, oldest first.
pub async fn list_responses(State(state): State<AppState>) -> ApiResult<Vec<EnrollmentRecord>> {
    let revision_id = revision(&state).await;

    match state.store.list_responses().await {
        Ok(records) => success(records, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/responses/query - Records whose member in `slot` uses one of `usns`.
pub async fn query_responses(
    State(state): State<AppState>,
    Json(query): Json<MemberQuery>,
) -> ApiResult<Vec<EnrollmentRecord>> {
    let revision_id = revision(&state).await;

    if query.usns.len() > MAX_QUERY_USNS {
        return error(
            AppError::Validation(format!(
                "At most {} identifiers per query",
                MAX_QUERY_USNS
            )),
            revision_id,
        );
    }

    match state
        .store
        .responses_with_members(query.slot, &query.usns)
        .await
    {
        Ok(records) => success(records, revision_id),
        Err(e) => error(e, revision_id),
    }
}
