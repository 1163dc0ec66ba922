//! Advisory duplicate-enrollment pre-check.
//!
//! Runs before a claim so a team hears about an already-registered USN without losing its
//! topic selection. The claim transaction enforces uniqueness on its own; this check fails
//! open.

use crate::models::MemberSlot;
use crate::store::EnrollmentStore;

/// Identifiers from `usns` that already appear in a committed record, in input order.
pub async fn check_duplicates<S>(store: &S, usns: [&str; 2]) -> Vec<String>
where
    S: EnrollmentStore + ?Sized,
{
    let wanted: Vec<String> = usns.iter().map(|u| u.to_string()).collect();

    let (first, second) = tokio::join!(
        store.responses_with_members(MemberSlot::Student1, &wanted),
        store.responses_with_members(MemberSlot::Student2, &wanted),
    );

    let (first, second) = match (first, second) {
        (Ok(first), Ok(second)) => (first, second),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Duplicate check failed, continuing without it: {}", e);
            return Vec::new();
        }
    };

    let taken: Vec<&str> = first
        .iter()
        .chain(second.iter())
        .flat_map(|record| record.member_usns())
        .collect();

    let mut found: Vec<String> = Vec::new();
    for usn in usns {
        if taken.contains(&usn) && !found.iter().any(|f| f == usn) {
            found.push(usn.to_string());
        }
    }
    found
}
