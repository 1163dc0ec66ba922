//! Topic model matching the portal's topic documents.

use serde::{Deserialize, Serialize};

/// A project topic in the shared pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    /// Stored as `taken`; flips to true exactly once, through a claim.
    #[serde(rename = "taken")]
    pub claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Topic {
    pub fn is_available(&self) -> bool {
        !self.claimed
    }
}

/// Request body for seeding a new topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    /// Caller-chosen id; a UUID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub section: Option<String>,
}

/// Query parameters for listing topics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicQuery {
    /// Restrict to a single section (cohort).
    #[serde(default)]
    pub section: Option<String>,
    /// Free-text search over titles.
    #[serde(default)]
    pub q: Option<String>,
    /// Hide topics that were already claimed.
    #[serde(default)]
    pub available_only: bool,
}

impl TopicQuery {
    /// Whether a topic passes the section and availability filters.
    pub fn admits(&self, topic: &Topic) -> bool {
        if self.available_only && !topic.is_available() {
            return false;
        }
        match &self.section {
            Some(section) => topic.section.as_deref() == Some(section.as_str()),
            None => true,
        }
    }

    /// The search text, if it contains anything besides whitespace.
    pub fn search_text(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}
