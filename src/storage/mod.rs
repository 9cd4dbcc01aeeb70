//! Storage Layer - two interchangeable document backends
//!
//! - `SqliteStore`: the document database, with generated `_id` keys
//!   and a `legacy_identities` mapping for imported documents
//! - `FileStore`: the JSON data file, with integer `id` keys
//!
//! Both implement [`DocumentBackend`], so request handlers never know
//! which one served them.

pub mod file;
pub mod schema;
pub mod sqlite;

pub use file::{DataFile, FileStore};
pub use sqlite::{CollectionStats, DbStats, IdentityMapping, SqliteStore, UpsertOutcome};

use async_trait::async_trait;
use crate::Result;
use crate::collection::Collection;
use crate::document::Document;
use crate::query::{ListPage, ListQuery};

/// Which backend served an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Database,
    File,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Database => "database",
            BackendKind::File => "file",
        }
    }
}

/// List/Get/Create/Update/Delete over named collections.
///
/// `id` is interpreted in the backend's own identity scheme. Lookups that
/// match nothing fail with [`crate::Error::NotFound`].
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<ListPage>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Document>;

    /// Store a new document and return it with its assigned identity
    async fn create(&self, collection: Collection, body: Document) -> Result<Document>;

    /// Shallow-merge `partial` over the stored document and return the result
    async fn update(&self, collection: Collection, id: &str, partial: Document) -> Result<Document>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}
