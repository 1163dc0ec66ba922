//! HTTP client for the store's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::EnrollmentStore;
use crate::auth::API_KEY_HEADER;
use crate::errors::{codes, AppError, ErrorResponse, FieldError};
use crate::models::{
    AbortReason, ClaimOutcome, ClaimRequest, EnrollmentRecord, MemberQuery, MemberSlot, Stats,
    Topic, TopicQuery, WindowStatus,
};

/// Success envelope as produced by the API.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// The shared store reached over the network.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Current status of the enrollment window as configured on the server.
    pub async fn window_status(&self) -> Result<WindowStatus, AppError> {
        let response = self.request(self.client.get(self.url("/api/window"))).await?;
        read_data(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of one topic, with the id percent-encoded as a single path segment.
    fn topic_url(&self, id: &str) -> Result<Url, AppError> {
        let invalid = || AppError::Transport(format!("Invalid store URL {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["api", "topics", id]);
        Ok(url)
    }

    async fn request(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let builder = match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        };
        Ok(builder.send().await?)
    }
}

#[async_trait]
impl EnrollmentStore for RemoteStore {
    async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<Topic>, AppError> {
        let response = self
            .request(self.client.get(self.url("/api/topics")).query(query))
            .await?;
        read_data(response).await
    }

    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        let response = self
            .request(self.client.get(self.topic_url(id)?))
            .await?;
        match read_data(response).await {
            Ok(topic) => Ok(Some(topic)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn claim_topic(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError> {
        let response = self
            .request(self.client.post(self.url("/api/claims")).json(request))
            .await?;
        match read_data(response).await {
            Ok(record) => Ok(ClaimOutcome::Committed(record)),
            Err(AppError::ClaimAborted(reason)) => Ok(ClaimOutcome::Aborted(reason)),
            Err(e) => Err(e),
        }
    }

    async fn responses_with_members(
        &self,
        slot: MemberSlot,
        usns: &[String],
    ) -> Result<Vec<EnrollmentRecord>, AppError> {
        let body = MemberQuery {
            slot,
            usns: usns.to_vec(),
        };
        let response = self
            .request(self.client.post(self.url("/api/responses/query")).json(&body))
            .await?;
        read_data(response).await
    }

    async fn list_responses(&self) -> Result<Vec<EnrollmentRecord>, AppError> {
        let response = self
            .request(self.client.get(self.url("/api/responses")))
            .await?;
        read_data(response).await
    }

    async fn stats(&self) -> Result<Stats, AppError> {
        let response = self.request(self.client.get(self.url("/api/stats"))).await?;
        read_data(response).await
    }
}

/// Unwrap a success envelope, or turn an error envelope back into an `AppError`.
async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        let envelope: DataEnvelope<T> = response.json().await?;
        return Ok(envelope.data);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => Err(error_from_envelope(body)),
        Err(_) => Err(AppError::Transport(format!(
            "Unexpected response ({}): {}",
            status, text
        ))),
    }
}

fn error_from_envelope(body: ErrorResponse) -> AppError {
    let ErrorResponse { error, .. } = body;
    let details = error.details.unwrap_or(serde_json::Value::Null);

    match error.code.as_str() {
        codes::TOPIC_NOT_FOUND => AppError::ClaimAborted(AbortReason::NotFound),
        codes::ALREADY_CLAIMED => AppError::ClaimAborted(AbortReason::AlreadyClaimed),
        codes::WINDOW_CLOSED => AppError::ClaimAborted(AbortReason::WindowClosed),
        codes::DUPLICATE_IDENTIFIER => {
            let usns = serde_json::from_value(details["usns"].clone()).unwrap_or_default();
            AppError::ClaimAborted(AbortReason::DuplicateIdentifier(usns))
        }
        codes::VALIDATION_ERROR => {
            match serde_json::from_value::<Vec<FieldError>>(details["fields"].clone()) {
                Ok(fields) if !fields.is_empty() => AppError::InvalidSubmission(fields),
                _ => AppError::Validation(error.message),
            }
        }
        codes::UNAUTHORIZED => AppError::Unauthorized(error.message),
        codes::NOT_FOUND => AppError::NotFound(error.message),
        codes::CONFLICT => AppError::Conflict(error.message),
        codes::BAD_REQUEST => AppError::BadRequest(error.message),
        _ => AppError::Transport(format!("{}: {}", error.code, error.message)),
    }
}
