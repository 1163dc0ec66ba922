//! In-process store: SQLite repository, title index and window gate behind one facade.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::EnrollmentStore;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{
    AbortReason, ClaimOutcome, ClaimRequest, CreateTopicRequest, EnrollmentRecord, MemberSlot,
    Stats, Topic, TopicQuery,
};
use crate::search::TopicIndex;
use crate::validation::validate_submission;
use crate::window::EnrollmentWindow;

/// The store served by the REST API.
#[derive(Clone)]
pub struct SharedStore {
    repo: Arc<Repository>,
    search: Arc<TopicIndex>,
    window: EnrollmentWindow,
}

impl SharedStore {
    pub fn new(repo: Arc<Repository>, search: Arc<TopicIndex>, window: EnrollmentWindow) -> Self {
        Self {
            repo,
            search,
            window,
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn window(&self) -> &EnrollmentWindow {
        &self.window
    }

    /// Add a topic to the pool. Only allowed before the window opens.
    pub async fn create_topic(&self, request: &CreateTopicRequest) -> Result<Topic, AppError> {
        if request.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if Utc::now() >= self.window.start() {
            return Err(AppError::Conflict(
                "Topics can only be added before the enrollment window opens".to_string(),
            ));
        }

        let topic = self.repo.create_topic(request).await?;
        if let Err(e) = self.search.index_topic(&topic).await {
            tracing::warn!("Failed to index topic {}: {}", topic.id, e);
        }
        Ok(topic)
    }

    /// Seed an empty pool and rebuild the title index from the database.
    pub async fn seed_and_index(&self, seed: &[CreateTopicRequest]) -> Result<usize, AppError> {
        let inserted = self.repo.seed_topics(seed).await?;
        if inserted > 0 {
            tracing::info!("Seeded {} topics", inserted);
        }

        let topics = self.repo.list_topics().await?;
        self.search.rebuild(&topics).await?;
        Ok(inserted)
    }
}

#[async_trait]
impl EnrollmentStore for SharedStore {
    async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<Topic>, AppError> {
        let topics = self.repo.list_topics().await?;

        let matching = match query.search_text() {
            Some(text) => Some(self.search.search(text)?),
            None => None,
        };

        Ok(topics
            .into_iter()
            .filter(|t| query.admits(t))
            .filter(|t| matching.as_ref().map_or(true, |ids| ids.contains(&t.id)))
            .collect())
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        self.repo.get_topic(id).await
    }

    async fn claim_topic(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError> {
        validate_submission(request)?;

        if !self.window.is_open(Utc::now()) {
            tracing::info!(topic_id = %request.topic_id, "Claim rejected: window closed");
            return Ok(ClaimOutcome::Aborted(AbortReason::WindowClosed));
        }

        self.repo.claim_topic(request).await
    }

    async fn responses_with_members(
        &self,
        slot: MemberSlot,
        usns: &[String],
    ) -> Result<Vec<EnrollmentRecord>, AppError> {
        self.repo.responses_with_members(slot, usns).await
    }

    async fn list_responses(&self) -> Result<Vec<EnrollmentRecord>, AppError> {
        self.repo.list_responses().await
    }

    async fn stats(&self) -> Result<Stats, AppError> {
        self.repo.stats().await
    }
}
