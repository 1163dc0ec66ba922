//! Database module for SQLite persistence.
//!
//! SQLite is the shared store: it holds the topic pool and every team's response, and its
//! transactions are what keep two teams from claiming the same topic.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    // Writers queue on the database lock instead of failing fast.
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            taken INTEGER NOT NULL DEFAULT 0,
            section TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // One response per claimed topic is kept by the claim transaction, not by an index.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS responses (
            id TEXT PRIMARY KEY,
            topic_id TEXT NOT NULL,
            topic_title TEXT NOT NULL,
            student1_name TEXT NOT NULL,
            student1_usn TEXT NOT NULL,
            student2_name TEXT NOT NULL,
            student2_usn TEXT NOT NULL,
            timestamp TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS member_reservations (
            usn TEXT PRIMARY KEY,
            response_id TEXT NOT NULL REFERENCES responses(id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_topics_title ON topics(title);
        CREATE INDEX IF NOT EXISTS idx_topics_taken ON topics(taken);
        CREATE INDEX IF NOT EXISTS idx_topics_section ON topics(section);
        CREATE INDEX IF NOT EXISTS idx_responses_student1_usn ON responses(student1_usn);
        CREATE INDEX IF NOT EXISTS idx_responses_student2_usn ON responses(student2_usn);
        CREATE INDEX IF NOT EXISTS idx_responses_timestamp ON responses(timestamp);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
