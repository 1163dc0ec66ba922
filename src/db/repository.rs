//! Database repository for the topic pool and team responses.
//!
//! Uses prepared statements and transactions for data integrity. The only write path for
//! `topics.taken` and `responses` is [`Repository::claim_topic`].

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    AbortReason, ClaimOutcome, ClaimRequest, CreateTopicRequest, EnrollmentRecord, MemberSlot,
    Stats, Topic,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    // ==================== TOPIC OPERATIONS ====================

    /// List all topics.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        let rows = sqlx::query("SELECT id, title, taken, section FROM topics ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(topic_from_row).collect())
    }

    /// Get a topic by ID.
    pub async fn get_topic(&self, id: &str) -> Result<Option<Topic>, AppError> {
        let row = sqlx::query("SELECT id, title, taken, section FROM topics WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(topic_from_row))
    }

    /// Insert a new, unclaimed topic into the pool.
    pub async fn create_topic(&self, request: &CreateTopicRequest) -> Result<Topic, AppError> {
        let mut tx = self.pool.begin().await?;
        let topic = insert_topic(&mut tx, request).await?;
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(topic)
    }

    /// Seed the pool from a list of topics, but only while it is still empty.
    ///
    /// Returns the number of topics inserted.
    pub async fn seed_topics(&self, topics: &[CreateTopicRequest]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 || topics.is_empty() {
            return Ok(0);
        }

        for request in topics {
            insert_topic(&mut tx, request).await?;
        }
        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(topics.len())
    }

    // ==================== CLAIM TRANSACTION ====================

    /// Atomically claim a topic for a team and record the team's response.
    ///
    /// The conditional update takes the database write lock before anything is read, so two
    /// concurrent claims on one topic serialize and the second sees `taken = 1`. Member
    /// identifiers are reserved inside the same transaction. Every abort rolls back; store
    /// failures surface as `Err` and also leave nothing behind.
    pub async fn claim_topic(&self, request: &ClaimRequest) -> Result<ClaimOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query("UPDATE topics SET taken = 1 WHERE id = ? AND taken = 0")
            .bind(&request.topic_id)
            .execute(&mut *tx)
            .await?;

        if marked.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM topics WHERE id = ?")
                .bind(&request.topic_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;

            let reason = if exists {
                AbortReason::AlreadyClaimed
            } else {
                AbortReason::NotFound
            };
            tracing::info!(topic_id = %request.topic_id, ?reason, "Claim aborted");
            return Ok(ClaimOutcome::Aborted(reason));
        }

        let topic_title: String = sqlx::query_scalar("SELECT title FROM topics WHERE id = ?")
            .bind(&request.topic_id)
            .fetch_one(&mut *tx)
            .await?;

        let usns = request.usns();
        let reserved: Vec<String> =
            sqlx::query_scalar("SELECT usn FROM member_reservations WHERE usn IN (?, ?)")
                .bind(&usns[0])
                .bind(&usns[1])
                .fetch_all(&mut *tx)
                .await?;

        if !reserved.is_empty() {
            tx.rollback().await?;

            let duplicates: Vec<String> = usns
                .into_iter()
                .filter(|usn| reserved.contains(usn))
                .collect();
            tracing::info!(
                topic_id = %request.topic_id,
                usns = ?duplicates,
                "Claim aborted: identifier already registered"
            );
            return Ok(ClaimOutcome::Aborted(AbortReason::DuplicateIdentifier(
                duplicates,
            )));
        }

        let record = EnrollmentRecord {
            id: uuid::Uuid::new_v4().to_string(),
            topic_id: request.topic_id.clone(),
            topic_title,
            student1_name: request.student1_name.clone(),
            student1_usn: request.student1_usn.clone(),
            student2_name: request.student2_name.clone(),
            student2_usn: request.student2_usn.clone(),
            timestamp: now_timestamp(),
        };

        sqlx::query(
            r#"INSERT INTO responses (
                id, topic_id, topic_title, student1_name, student1_usn,
                student2_name, student2_usn, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&record.id)
        .bind(&record.topic_id)
        .bind(&record.topic_title)
        .bind(&record.student1_name)
        .bind(&record.student1_usn)
        .bind(&record.student2_name)
        .bind(&record.student2_usn)
        .bind(&record.timestamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO member_reservations (usn, response_id) VALUES (?, ?), (?, ?)")
            .bind(&record.student1_usn)
            .bind(&record.id)
            .bind(&record.student2_usn)
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        tracing::info!(
            topic_id = %record.topic_id,
            response_id = %record.id,
            "Claim committed"
        );
        Ok(ClaimOutcome::Committed(record))
    }

    // ==================== RESPONSE OPERATIONS ====================

    /// List every committed response, oldest first.
    pub async fn list_responses(&self) -> Result<Vec<EnrollmentRecord>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, topic_id, topic_title, student1_name, student1_usn,
                      student2_name, student2_usn, timestamp
               FROM responses ORDER BY timestamp, id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Responses whose member in `slot` has one of the given identifiers.
    pub async fn responses_with_members(
        &self,
        slot: MemberSlot,
        usns: &[String],
    ) -> Result<Vec<EnrollmentRecord>, AppError> {
        if usns.is_empty() {
            return Ok(Vec::new());
        }

        let column = match slot {
            MemberSlot::Student1 => "student1_usn",
            MemberSlot::Student2 => "student2_usn",
        };
        let placeholders = vec!["?"; usns.len()].join(", ");
        let sql = format!(
            r#"SELECT id, topic_id, topic_title, student1_name, student1_usn,
                      student2_name, student2_usn, timestamp
               FROM responses WHERE {} IN ({}) ORDER BY timestamp, id"#,
            column, placeholders
        );

        let mut query = sqlx::query(&sql);
        for usn in usns {
            query = query.bind(usn);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    // ==================== STATS ====================

    /// Count topics, unclaimed topics, and responses.
    pub async fn stats(&self) -> Result<Stats, AppError> {
        let row = sqlx::query(
            r#"SELECT
                (SELECT COUNT(*) FROM topics) AS total_topics,
                (SELECT COUNT(*) FROM topics WHERE taken = 0) AS available_topics,
                (SELECT COUNT(*) FROM responses) AS total_responses"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_topics: row.get("total_topics"),
            available_topics: row.get("available_topics"),
            total_responses: row.get("total_responses"),
        })
    }
}

// Helpers shared by the write paths

async fn insert_topic(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request: &CreateTopicRequest,
) -> Result<Topic, AppError> {
    let id = request
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = sqlx::query(
        "INSERT INTO topics (id, title, taken, section, created_at) VALUES (?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(&request.title)
    .bind(&request.section)
    .bind(now_timestamp())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(Topic {
            id,
            title: request.title.clone(),
            claimed: false,
            section: request.section.clone(),
        }),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            AppError::Conflict(format!("Topic {} already exists", id)),
        ),
        Err(e) => Err(e.into()),
    }
}

async fn bump_revision(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(now_timestamp())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Fixed-width UTC timestamps so that text ordering matches time ordering.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// Helper functions for row conversion

fn topic_from_row(row: &sqlx::sqlite::SqliteRow) -> Topic {
    let taken: i32 = row.get("taken");
    Topic {
        id: row.get("id"),
        title: row.get("title"),
        claimed: taken != 0,
        section: row.get("section"),
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> EnrollmentRecord {
    EnrollmentRecord {
        id: row.get("id"),
        topic_id: row.get("topic_id"),
        topic_title: row.get("topic_title"),
        student1_name: row.get("student1_name"),
        student1_usn: row.get("student1_usn"),
        student2_name: row.get("student2_name"),
        student2_usn: row.get("student2_usn"),
        timestamp: row.get("timestamp"),
    }
}
