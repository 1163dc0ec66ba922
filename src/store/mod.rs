//! The shared store as seen by portal clients.
//!
//! [`EnrollmentStore`] is the seam between the portal flow and the store: [`SharedStore`]
//! serves it in-process on top of SQLite and the search index, [`RemoteStore`] reaches the
//! same operations over the REST API.

mod remote;
mod shared;

pub use remote::RemoteStore;
pub use shared::SharedStore;

#[cfg(test)]
pub(crate) use shared::tests as test_support;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{
    ClaimOutcome, ClaimRequest, EnrollmentRecord, MemberSlot, Stats, Topic, TopicQuery,
};

/// Operations the portal needs from the shared store. All of them may fail with a
/// transport or database error.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Topics matching the section, availability and search filters, ordered by title.
    async fn list_topics(&self, query: &TopicQuery) -> Result<Vec<Topic>, AppError>;

    /// Read one topic document.
    async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError>;

    /// Run the claim transaction.
    ///
    /// Aborts are `Ok(ClaimOutcome::Aborted(_))`; `Err` means the request was invalid or
    /// the store failed, and in both cases nothing was written.
    async fn claim_topic(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError>;

    /// Membership query: responses whose member in `slot` uses one of `usns`.
    async fn responses_with_members(
        &self,
        slot: MemberSlot,
        usns: &[String],
    ) -> Result<Vec<EnrollmentRecord>, AppError>;

    /// Every committed response, oldest first.
    async fn list_responses(&self) -> Result<Vec<EnrollmentRecord>, AppError>;

    async fn stats(&self) -> Result<Stats, AppError>;
}
