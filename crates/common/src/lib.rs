//! PaperLedger Common Library
//!
//! Shared code for the PaperLedger gateway and agent including:
//! - Database models and store seams (PostgreSQL and in-memory)
//! - Blob storage for uploaded files
//! - Ledger and LLM client abstractions
//! - Quotes and payment settlement
//! - Error types, configuration and metrics
//! - Wire types shared over HTTP

pub mod api;
pub mod billing;
pub mod config;
pub mod content;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod llm;
pub mod metrics;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryStore, PaperStore, Repository, SessionStore};
pub use errors::{AppError, Result};
pub use ledger::Ledger;
pub use llm::ChatModel;
pub use storage::BlobStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
