//! # bdtrip - Travel booking backend
//!
//! Serves six schema-less collections (services, destinations, users,
//! service bookings, destination bookings, admin) over HTTP.
//!
//! bdtrip provides:
//! - A SQLite document database with generated `_id` keys
//! - A JSON data file fallback used whenever the database is unavailable
//! - Per-request backend selection driven by connection health
//! - One-way file → database sync (with pruning and watch mode) and bulk migration

pub mod collection;
pub mod document;
pub mod query;
pub mod storage;
pub mod health;
pub mod router;
pub mod sync;
pub mod migrate;
pub mod watcher;
pub mod server;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use collection::Collection;
pub use document::Document;
pub use health::{Connectivity, HealthMonitor};
pub use router::StorageRouter;
pub use storage::{DocumentBackend, FileStore, SqliteStore};

/// Result type alias for bdtrip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bdtrip operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid data file: {0}")]
    InvalidDataFile(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}
