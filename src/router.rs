//! Storage-abstraction router
//!
//! Picks the backend for one request from an explicitly passed
//! [`Connectivity`] snapshot: the database when connected and attached,
//! the data file otherwise.

use std::sync::{Arc, RwLock};
use crate::health::Connectivity;
use crate::storage::{DocumentBackend, FileStore, SqliteStore};

pub struct StorageRouter {
    file: Arc<FileStore>,
    database: RwLock<Option<Arc<SqliteStore>>>,
}

impl StorageRouter {
    pub fn new(file: FileStore) -> Self {
        Self {
            file: Arc::new(file),
            database: RwLock::new(None),
        }
    }

    pub fn with_database(self, db: Arc<SqliteStore>) -> Self {
        self.attach_database(db);
        self
    }

    pub fn file_store(&self) -> &Arc<FileStore> {
        &self.file
    }

    pub fn database(&self) -> Option<Arc<SqliteStore>> {
        self.database
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn attach_database(&self, db: Arc<SqliteStore>) {
        *self.database.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(db);
    }

    pub fn detach_database(&self) {
        *self.database.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Backend for a request that observed `health` when it started
    pub fn backend(&self, health: Connectivity) -> Arc<dyn DocumentBackend> {
        if health.is_connected() {
            if let Some(db) = self.database() {
                return db;
            }
        }
        self.file.clone()
    }
}
