//! Configuration module for the enrollment store service.
//!
//! All configuration is loaded once from environment variables at startup. The enrollment
//! window bounds are absolute instants and have no defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;
use crate::window::EnrollmentWindow;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Enrollment window, from ENROLL_WINDOW_START / ENROLL_WINDOW_END
    pub window: EnrollmentWindow,
    /// Optional JSON file with topics to seed into an empty pool
    pub seed_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("ENROLL_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("ENROLL_DB_PATH")
            .unwrap_or_else(|_| "./data/enrollment.sqlite".to_string())
            .into();

        let index_path = env::var("ENROLL_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr = env::var("ENROLL_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid ENROLL_BIND_ADDR: {}", e)))?;

        let log_level = env::var("ENROLL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json = match env::var("ENROLL_LOG_FORMAT").as_deref() {
            Err(_) | Ok("text") => false,
            Ok("json") => true,
            Ok(other) => {
                return Err(AppError::Config(format!(
                    "Invalid ENROLL_LOG_FORMAT: {} (expected text or json)",
                    other
                )))
            }
        };

        let window = EnrollmentWindow::parse(
            &required("ENROLL_WINDOW_START")?,
            &required("ENROLL_WINDOW_END")?,
        )?;

        let seed_path = env::var("ENROLL_SEED_PATH").ok().map(PathBuf::from);

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_json,
            window,
            seed_path,
        })
    }
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{} must be set (RFC 3339 timestamp)", key)))
}
