//! Topic API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, revision, success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateTopicRequest, Topic, TopicQuery};
use crate::store::EnrollmentStore;
use crate::AppState;

/// GET /api/topics - List topics, filtered by section, search text and availability.
pub async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<TopicQuery>,
) -> ApiResult<Vec<Topic>> {
    let revision_id = revision(&state).await;

    match state.store.list_topics(&query).await {
        Ok(topics) => success(topics, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/topics/:id - Get a single topic.
pub async fn get_topic(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Topic> {
    let revision_id = revision(&state).await;

    match state.store.get_topic(&id).await {
        Ok(Some(topic)) => success(topic, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Topic {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/topics - Add a topic to the pool before the window opens.
pub async fn create_topic(
    State(state): State<AppState>,
    Json(request): Json<CreateTopicRequest>,
) -> ApiResult<Topic> {
    let revision_id = revision(&state).await;

    match state.store.create_topic(&request).await {
        Ok(topic) => {
            let new_revision = revision(&state).await;
            success(topic, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}
