//! The team-facing enrollment flow.
//!
//! A [`Portal`] decides which screen a team may see (window gate, local cache, session) and
//! drives one [`ClaimFlow`] from a selected topic to a committed or aborted claim.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::cache::{CachedEnrollment, LocalEnrollmentCache};
use super::duplicates::check_duplicates;
use super::identity::Session;
use crate::errors::{AppError, FieldError};
use crate::models::{
    AbortReason, ClaimOutcome, ClaimRequest, EnrollmentRecord, Stats, Topic, TopicQuery,
    WindowStatus,
};
use crate::store::EnrollmentStore;
use crate::validation::{normalize_usn, validate_submission};
use crate::window::EnrollmentWindow;

/// Sections (cohorts) a team can enroll under.
pub const SECTIONS: [&str; 2] = ["A", "B"];

/// Message shown when a signed-out user tries to enter.
pub const SIGN_IN_REQUIRED: &str = "Please log in first!";

/// Navigation targets of the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Section,
    Topics { section: Option<String> },
    Confirm { topic: Topic },
    Progress,
}

/// What the landing screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Landing {
    /// Outside the window: countdown only.
    Closed(WindowStatus),
    /// This machine already enrolled a team.
    AlreadyEnrolled(CachedEnrollment),
    /// Window open and nothing cached: the team may enter.
    Open(WindowStatus),
}

/// Names and identifiers a team types on the confirmation screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberForm {
    pub student1_name: String,
    pub student1_usn: String,
    pub student2_name: String,
    pub student2_usn: String,
}

/// Where a claim stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    Selected,
    Validating,
    Committing,
    Committed(EnrollmentRecord),
    Aborted(AbortReason),
}

/// One team's attempt at claiming one topic.
#[derive(Debug, Clone)]
pub struct ClaimFlow {
    topic: Topic,
    state: ClaimState,
    field_errors: Vec<FieldError>,
}

impl ClaimFlow {
    fn new(topic: Topic) -> Self {
        Self {
            topic,
            state: ClaimState::Selected,
            field_errors: Vec::new(),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    /// Errors from the last rejected form, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Go back to the form after an abort. Returns false in any other state.
    pub fn retry(&mut self) -> bool {
        if matches!(self.state, ClaimState::Aborted(_)) {
            self.state = ClaimState::Selected;
            true
        } else {
            false
        }
    }

    /// Screen to show for the current state.
    pub fn route(&self) -> Route {
        match self.state {
            ClaimState::Committed(_) => Route::Progress,
            _ => Route::Confirm {
                topic: self.topic.clone(),
            },
        }
    }

    fn abort(&mut self, reason: AbortReason) -> ClaimOutcome {
        tracing::info!(topic_id = %self.topic.id, "Claim aborted: {}", reason.message());
        self.state = ClaimState::Aborted(reason.clone());
        ClaimOutcome::Aborted(reason)
    }

    fn reject(&mut self, fields: Vec<FieldError>) -> AppError {
        self.field_errors = fields.clone();
        self.state = ClaimState::Selected;
        AppError::InvalidSubmission(fields)
    }
}

/// A team's portal session against a store.
pub struct Portal<S: EnrollmentStore + ?Sized> {
    store: Arc<S>,
    cache: LocalEnrollmentCache,
    window: EnrollmentWindow,
    session: Session,
}

impl<S: EnrollmentStore + ?Sized> Portal<S> {
    pub fn new(store: Arc<S>, cache: LocalEnrollmentCache, window: EnrollmentWindow) -> Self {
        Self {
            store,
            cache,
            window,
            session: Session::anonymous(),
        }
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn window(&self) -> &EnrollmentWindow {
        &self.window
    }

    pub async fn cached(&self) -> Option<CachedEnrollment> {
        self.cache.read().await
    }

    /// Choose the landing screen.
    pub async fn landing(&self, now: DateTime<Utc>) -> Landing {
        let status = self.window.status(now);
        if !status.open {
            return Landing::Closed(status);
        }
        match self.cache.read().await {
            Some(entry) => Landing::AlreadyEnrolled(entry),
            None => Landing::Open(status),
        }
    }

    /// The "enter" action of the landing screen.
    pub async fn enter(&self, now: DateTime<Utc>) -> Result<Route, AppError> {
        if !self.session.is_signed_in() {
            return Err(AppError::Unauthorized(SIGN_IN_REQUIRED.to_string()));
        }
        Ok(self.guard(Route::Section, now).await)
    }

    /// Redirect a navigation request the team is not allowed to make.
    ///
    /// Flow screens need an open window, a signed-in session and no prior enrollment from
    /// this machine; a prior enrollment always leads to the progress view.
    pub async fn guard(&self, route: Route, now: DateTime<Utc>) -> Route {
        match route {
            Route::Landing | Route::Progress => route,
            Route::Section | Route::Topics { .. } | Route::Confirm { .. } => {
                if !self.window.is_open(now) {
                    return Route::Landing;
                }
                if self.cache.read().await.is_some() {
                    return Route::Progress;
                }
                if !self.session.is_signed_in() {
                    return Route::Landing;
                }
                route
            }
        }
    }

    /// Unclaimed topics of a section, optionally narrowed by a title search.
    pub async fn topics(
        &self,
        section: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Topic>, AppError> {
        let query = TopicQuery {
            section: section.map(str::to_string),
            q: search.map(str::to_string),
            available_only: true,
        };
        self.store.list_topics(&query).await
    }

    /// Select a topic and open the confirmation form for it.
    pub async fn begin_claim(&self, topic_id: &str) -> Result<ClaimFlow, AppError> {
        match self.store.get_topic(topic_id).await? {
            // A store answering for some other topic counts as not finding this one
            Some(topic) if topic.id != topic_id => {
                tracing::warn!("Store returned topic {} for {}", topic.id, topic_id);
                Err(AppError::ClaimAborted(AbortReason::NotFound))
            }
            Some(topic) if !topic.is_available() => {
                Err(AppError::ClaimAborted(AbortReason::AlreadyClaimed))
            }
            Some(topic) => Ok(ClaimFlow::new(topic)),
            None => Err(AppError::ClaimAborted(AbortReason::NotFound)),
        }
    }

    /// Validate the form, pre-check identifiers, and run the claim transaction.
    ///
    /// Field errors come back as `Err(AppError::InvalidSubmission)` with the flow still on
    /// the form. Everything the store decides comes back as a [`ClaimOutcome`]; a store that
    /// cannot be reached aborts the claim.
    pub async fn submit(
        &self,
        flow: &mut ClaimFlow,
        form: &MemberForm,
    ) -> Result<ClaimOutcome, AppError> {
        if flow.state != ClaimState::Selected {
            return Err(AppError::BadRequest(
                "This claim was already submitted".to_string(),
            ));
        }

        flow.state = ClaimState::Validating;
        flow.field_errors.clear();

        let request = ClaimRequest {
            topic_id: flow.topic.id.clone(),
            student1_name: form.student1_name.trim().to_string(),
            student1_usn: normalize_usn(&form.student1_usn),
            student2_name: form.student2_name.trim().to_string(),
            student2_usn: normalize_usn(&form.student2_usn),
        };

        match validate_submission(&request) {
            Ok(()) => {}
            Err(AppError::InvalidSubmission(fields)) => return Err(flow.reject(fields)),
            Err(e) => {
                flow.state = ClaimState::Selected;
                return Err(e);
            }
        }

        if !self.window.is_open(Utc::now()) {
            return Ok(flow.abort(AbortReason::WindowClosed));
        }

        let duplicates = check_duplicates(
            &*self.store,
            [request.student1_usn.as_str(), request.student2_usn.as_str()],
        )
        .await;
        if !duplicates.is_empty() {
            return Ok(flow.abort(AbortReason::DuplicateIdentifier(duplicates)));
        }

        flow.state = ClaimState::Committing;
        match self.store.claim_topic(&request).await {
            Ok(ClaimOutcome::Committed(record)) => {
                let entry = CachedEnrollment::from_record(&record, Utc::now());
                if let Err(e) = self.cache.write(&entry).await {
                    tracing::error!("Claim committed but could not be cached locally: {}", e);
                }
                tracing::info!(
                    topic_id = %record.topic_id,
                    record_id = %record.id,
                    "Topic claimed"
                );
                flow.state = ClaimState::Committed(record.clone());
                Ok(ClaimOutcome::Committed(record))
            }
            Ok(ClaimOutcome::Aborted(reason)) => Ok(flow.abort(reason)),
            Err(AppError::InvalidSubmission(fields)) => Err(flow.reject(fields)),
            Err(e) => Ok(flow.abort(AbortReason::Transport(e.message()))),
        }
    }

    /// Every team's record, for the progress view.
    pub async fn progress(&self) -> Result<Vec<EnrollmentRecord>, AppError> {
        self.store.list_responses().await
    }

    /// Counts for the landing view. `None` when the store cannot answer; the view carries on.
    pub async fn stats(&self) -> Option<Stats> {
        match self.store.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!("Failed to fetch stats: {}", e);
                None
            }
        }
    }
}
