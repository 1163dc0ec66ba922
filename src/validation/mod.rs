//! Student identifier (USN) and submission form validation.
//!
//! Pure functions: no I/O, deterministic, safe to call on every keystroke.

use crate::errors::{AppError, FieldError};
use crate::models::ClaimRequest;

/// Constant institution prefix of every USN.
pub const USN_PREFIX: &str = "1RV";
/// Cohort (admission year) codes accepted for this enrollment.
pub const ACCEPTED_COHORTS: [&str; 2] = ["23", "24"];
/// Department code.
pub const DEPARTMENT_CODE: &str = "IS";

pub const USN_HINT: &str = "Please enter a valid USN (e.g., 1RV23IS001 or 1RV24IS001)";

/// Trim and upper-case a raw identifier before validation.
pub fn normalize_usn(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Check a USN against `1RV(23|24)IS[0-9]{3}`.
///
/// The input is matched as given; callers normalize first when case should not matter.
pub fn validate_usn(usn: &str) -> Result<(), AppError> {
    if is_valid_usn(usn) {
        Ok(())
    } else {
        Err(AppError::Validation(USN_HINT.to_string()))
    }
}

fn is_valid_usn(usn: &str) -> bool {
    if usn.len() != 10 || !usn.is_ascii() {
        return false;
    }
    let (prefix, rest) = usn.split_at(USN_PREFIX.len());
    let (cohort, rest) = rest.split_at(2);
    let (department, serial) = rest.split_at(DEPARTMENT_CODE.len());

    prefix == USN_PREFIX
        && ACCEPTED_COHORTS.contains(&cohort)
        && department == DEPARTMENT_CODE
        && serial.bytes().all(|b| b.is_ascii_digit())
}

/// Validate a complete submission, collecting every field-level problem.
///
/// Names must be non-empty, both USNs must be valid and the two USNs must differ.
/// USNs are expected to be normalized already.
pub fn validate_submission(request: &ClaimRequest) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if request.topic_id.trim().is_empty() {
        errors.push(FieldError::new("topicId", "Please select a topic"));
    }

    let members = [
        (
            "student1Name",
            "student1USN",
            "Student 1",
            &request.student1_name,
            &request.student1_usn,
        ),
        (
            "student2Name",
            "student2USN",
            "Student 2",
            &request.student2_name,
            &request.student2_usn,
        ),
    ];

    for (name_field, usn_field, label, name, usn) in members {
        if name.trim().is_empty() {
            errors.push(FieldError::new(
                name_field,
                format!("{} name is required", label),
            ));
        }
        if usn.trim().is_empty() {
            errors.push(FieldError::new(usn_field, format!("{} USN is required", label)));
        } else if validate_usn(usn).is_err() {
            errors.push(FieldError::new(usn_field, format!("{}: {}", label, USN_HINT)));
        }
    }

    if !request.student1_usn.is_empty() && request.student1_usn == request.student2_usn {
        errors.push(FieldError::new(
            "student2USN",
            "Both team members cannot use the same USN",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidSubmission(errors))
    }
}
