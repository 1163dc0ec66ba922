//! Local enrollment cache.
//!
//! The portal remembers a team's committed selection on the machine it enrolled from, so the
//! team cannot re-enter the flow. Storage is a small JSON key/value file whose values are
//! JSON strings, with the entry under [`STORAGE_KEY`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::EnrollmentRecord;

/// Key of the enrollment entry inside the storage file.
pub const STORAGE_KEY: &str = "topic_selection_state";

const STORAGE_FILE: &str = "local_storage.json";

/// The cached copy of a team's committed selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEnrollment {
    pub topic_id: String,
    pub topic_title: String,
    pub student1_name: String,
    #[serde(rename = "student1USN")]
    pub student1_usn: String,
    pub student2_name: String,
    #[serde(rename = "student2USN")]
    pub student2_usn: String,
    /// Client clock at commit time, ISO 8601.
    pub timestamp: String,
}

impl CachedEnrollment {
    pub fn from_record(record: &EnrollmentRecord, committed_at: DateTime<Utc>) -> Self {
        Self {
            topic_id: record.topic_id.clone(),
            topic_title: record.topic_title.clone(),
            student1_name: record.student1_name.clone(),
            student1_usn: record.student1_usn.clone(),
            student2_name: record.student2_name.clone(),
            student2_usn: record.student2_usn.clone(),
            timestamp: committed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// File-backed store for the single cached enrollment.
#[derive(Debug, Clone)]
pub struct LocalEnrollmentCache {
    path: PathBuf,
}

impl LocalEnrollmentCache {
    /// Use `dir` for the storage file, creating the directory if needed.
    pub async fn open(dir: &Path) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            path: dir.join(STORAGE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached entry, if one was written. Unreadable storage reads as absent.
    pub async fn read(&self) -> Option<CachedEnrollment> {
        let entries = self.load().await?;
        let raw = entries.get(STORAGE_KEY)?.as_str()?;

        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Ignoring corrupt enrollment cache entry: {}", e);
                None
            }
        }
    }

    /// Store `entry`, replacing any previous one.
    pub async fn write(&self, entry: &CachedEnrollment) -> Result<(), AppError> {
        let mut entries = self.load().await.unwrap_or_default();
        entries.insert(
            STORAGE_KEY.to_string(),
            Value::String(serde_json::to_string(entry)?),
        );

        let contents = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Enrollment cached at {}", self.path.display());
        Ok(())
    }

    async fn load(&self) -> Option<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                None
            }
        }
    }
}
