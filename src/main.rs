//! Topic enrollment store service.
//!
//! Serves the shared topic pool and the claim transaction over REST, backed by SQLite and a
//! Tantivy title index.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use topic_enrollment::config::Config;
use topic_enrollment::db::{self, Repository};
use topic_enrollment::errors::AppError;
use topic_enrollment::models::CreateTopicRequest;
use topic_enrollment::search::TopicIndex;
use topic_enrollment::store::SharedStore;
use topic_enrollment::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting topic enrollment store");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Enrollment window: {} to {}",
        config.window.start().to_rfc3339(),
        config.window.end().to_rfc3339()
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (ENROLL_API_PSK). Authentication is disabled!");
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let search = Arc::new(TopicIndex::open(&config.index_path)?);
    let store = SharedStore::new(repo, search, config.window);

    // Seed an empty pool, then build the title index from the database
    let seed = match &config.seed_path {
        Some(path) => load_seed(path).await?,
        None => Vec::new(),
    };
    store.seed_and_index(&seed).await?;

    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Read the seed file: a JSON array of `{id?, title, section?}` objects.
async fn load_seed(path: &Path) -> Result<Vec<CreateTopicRequest>, AppError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(format!("Failed to read seed file {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&raw)?)
}
