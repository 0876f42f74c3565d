//! Database layer for PaperLedger
//!
//! Provides:
//! - SeaORM entity models
//! - `PaperStore` / `SessionStore` seams with PostgreSQL and in-memory backends
//! - Connection pool management and schema bootstrap

pub mod models;
mod memory;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::{ChatSession, Paper};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Schema applied at startup; every statement is idempotent.
const SCHEMA: &str = include_str!("schema.sql");

/// Paper to be inserted
#[derive(Debug, Clone, Validate)]
pub struct NewPaper {
    #[validate(length(min = 1, max = 200))]
    pub id: String,

    #[validate(length(min = 1, max = 1000))]
    pub title: String,

    #[validate(length(min = 1))]
    pub authors: Vec<String>,

    #[validate(length(min = 1, max = 50000))]
    pub abstract_text: String,

    pub keywords: Vec<String>,

    #[validate(length(min = 1, max = 200))]
    pub publisher_id: String,

    #[validate(range(min = 0.0))]
    pub fee: f64,

    pub published_at: Option<DateTime<Utc>>,

    pub content_id: Option<Uuid>,

    pub topic_id: Option<String>,
}

/// Search hit with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPaper {
    pub paper: Paper,
    pub score: f64,
}

/// Paper metadata persistence and text search
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Insert a paper; an existing id yields `DuplicatePaper`
    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper>;

    async fn find_paper(&self, id: &str) -> Result<Option<Paper>>;

    /// All papers, newest publish date first
    async fn list_papers(&self) -> Result<Vec<Paper>>;

    /// Free-text search over title, abstract and keywords, best match first.
    /// A blank query returns the full listing.
    async fn search_papers(&self, query: &str) -> Result<Vec<ScoredPaper>>;

    /// Bump the access counter and last-access time, returning the updated paper
    async fn record_access(&self, id: &str) -> Result<Option<Paper>>;

    async fn ping(&self) -> Result<()>;
}

/// Chat session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self) -> Result<ChatSession>;

    async fn find_session(&self, id: Uuid) -> Result<Option<ChatSession>>;

    /// Replace a stored session; unknown ids yield `SessionNotFound`
    async fn save_session(&self, session: ChatSession) -> Result<ChatSession>;
}

/// Lowercased search terms with punctuation and common stop words removed
pub fn search_terms(query: &str) -> Vec<String> {
    const STOP_WORDS: &[&str] = &[
        "a", "an", "and", "are", "about", "as", "at", "be", "by", "for", "from", "i", "in",
        "is", "it", "me", "of", "on", "or", "show", "that", "the", "to", "what", "with",
    ];

    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Database connection pool wrapper
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            self.primary.execute_unprepared(statement).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}
