//! Enrollment records and the claim transaction's request and outcome types.

use serde::{Deserialize, Serialize};

/// A team's committed topic selection, as stored in the `responses` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub id: String,
    pub topic_id: String,
    pub topic_title: String,
    pub student1_name: String,
    #[serde(rename = "student1USN")]
    pub student1_usn: String,
    pub student2_name: String,
    #[serde(rename = "student2USN")]
    pub student2_usn: String,
    /// Assigned by the store at commit time (RFC 3339, UTC).
    pub timestamp: String,
}

impl EnrollmentRecord {
    pub fn member_usns(&self) -> [&str; 2] {
        [&self.student1_usn, &self.student2_usn]
    }
}

/// Request body for the claim transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub topic_id: String,
    pub student1_name: String,
    #[serde(rename = "student1USN")]
    pub student1_usn: String,
    pub student2_name: String,
    #[serde(rename = "student2USN")]
    pub student2_usn: String,
}

impl ClaimRequest {
    pub fn usns(&self) -> [String; 2] {
        [self.student1_usn.clone(), self.student2_usn.clone()]
    }
}

/// Which member column of a response a membership query matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MemberSlot {
    Student1,
    Student2,
}

/// Request body for `POST /api/responses/query`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberQuery {
    pub slot: MemberSlot,
    pub usns: Vec<String>,
}

/// Why a claim transaction did not commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum AbortReason {
    /// The topic id does not exist in the pool.
    NotFound,
    /// Another team committed a claim on the topic first.
    AlreadyClaimed,
    /// One or more member identifiers already belong to a committed record.
    DuplicateIdentifier(Vec<String>),
    /// Claims are only accepted inside the enrollment window.
    WindowClosed,
    /// The store could not be reached; nothing was written.
    Transport(String),
}

impl AbortReason {
    /// User-facing message for a blocking notification.
    pub fn message(&self) -> String {
        match self {
            AbortReason::NotFound => "Topic does not exist!".to_string(),
            AbortReason::AlreadyClaimed => "This topic has already been taken!".to_string(),
            AbortReason::DuplicateIdentifier(usns) => {
                format!("USN already registered: {}", usns.join(", "))
            }
            AbortReason::WindowClosed => "The enrollment window is closed".to_string(),
            AbortReason::Transport(detail) => {
                format!("Could not reach the enrollment store: {}", detail)
            }
        }
    }
}

/// Result of a claim transaction. Both branches must be handled by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Committed(EnrollmentRecord),
    Aborted(AbortReason),
}

impl ClaimOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ClaimOutcome::Committed(_))
    }
}

/// Pool and claim counts shown on the landing page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_topics: i64,
    pub available_topics: i64,
    pub total_responses: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_uses_store_field_names() {
        let record = EnrollmentRecord {
            id: "r1".to_string(),
            topic_id: "t1".to_string(),
            topic_title: "Compilers".to_string(),
            student1_name: "Asha".to_string(),
            student1_usn: "1RV23IS001".to_string(),
            student2_name: "Ravi".to_string(),
            student2_usn: "1RV23IS002".to_string(),
            timestamp: "2026-01-10T09:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["topicId"], "t1");
        assert_eq!(value["student1USN"], "1RV23IS001");
        assert_eq!(value["student2USN"], "1RV23IS002");
        assert_eq!(record.member_usns(), ["1RV23IS001", "1RV23IS002"]);
    }

    #[test]
    fn test_abort_reason_messages() {
        assert_eq!(
            AbortReason::AlreadyClaimed.message(),
            "This topic has already been taken!"
        );
        assert_eq!(
            AbortReason::DuplicateIdentifier(vec!["1RV23IS001".into(), "1RV23IS002".into()])
                .message(),
            "USN already registered: 1RV23IS001, 1RV23IS002"
        );
    }

    #[test]
    fn test_member_query_slot_format() {
        let query: MemberQuery =
            serde_json::from_str(r#"{"slot":"student2","usns":["1RV24IS010"]}"#).unwrap();
        assert_eq!(query.slot, MemberSlot::Student2);
    }
}
