//! File → database mirroring
//!
//! Every document of every known collection in the data file is upserted
//! into the database keyed on `legacyId`. With pruning enabled, database
//! documents whose `legacyId` no longer appears in the file are removed.
//! Per-document failures are recorded as warnings and never stop a pass.

use std::collections::HashSet;
use std::fmt;
use serde_json::Value;
use crate::collection::Collection;
use crate::document;
use crate::storage::{DataFile, FileStore, SqliteStore, UpsertOutcome};
use crate::Result;

/// A document (or a prune step) that could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWarning {
    pub collection: String,
    pub legacy_id: Option<String>,
    pub message: String,
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.legacy_id {
            Some(id) => write!(f, "{} legacyId={}: {}", self.collection, id, self.message),
            None => write!(f, "{}: {}", self.collection, self.message),
        }
    }
}

/// Counts for one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub documents: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub collections: Vec<CollectionReport>,
    /// Top-level keys with no matching collection
    pub skipped_collections: Vec<String>,
    pub warnings: Vec<SyncWarning>,
}

impl SyncReport {
    pub fn inserted(&self) -> usize {
        self.collections.iter().map(|c| c.inserted).sum()
    }

    pub fn updated(&self) -> usize {
        self.collections.iter().map(|c| c.updated).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.collections.iter().map(|c| c.unchanged).sum()
    }

    pub fn pruned(&self) -> usize {
        self.collections.iter().map(|c| c.pruned).sum()
    }

    /// Whether the pass wrote anything
    pub fn is_noop(&self) -> bool {
        self.inserted() == 0 && self.updated() == 0 && self.pruned() == 0
    }
}

pub struct Synchronizer<'a> {
    store: &'a SqliteStore,
    prune: bool,
}

impl<'a> Synchronizer<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store, prune: true }
    }

    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Read the data file and mirror it
    pub async fn sync_file(&self, file: &FileStore) -> Result<SyncReport> {
        let data = file.load().await?;
        Ok(self.sync(&data))
    }

    /// Mirror an already loaded data file
    pub fn sync(&self, data: &DataFile) -> SyncReport {
        tracing::info!("Starting sync...");
        let mut report = SyncReport::default();

        for (name, value) in data.entries() {
            let Value::Array(items) = value else {
                continue;
            };
            let Ok(collection) = name.parse::<Collection>() else {
                tracing::info!("Skipping {} (no matching collection)", name);
                report.skipped_collections.push(name.to_string());
                continue;
            };

            let summary = self.sync_collection(collection, items, &mut report.warnings);
            tracing::info!("Synced collection {} ({} docs)", collection, summary.documents);
            report.collections.push(summary);
        }

        tracing::info!(
            "Sync done: {} inserted, {} updated, {} unchanged, {} pruned, {} warnings",
            report.inserted(),
            report.updated(),
            report.unchanged(),
            report.pruned(),
            report.warnings.len()
        );
        report
    }

    fn sync_collection(&self, collection: Collection, items: &[Value], warnings: &mut Vec<SyncWarning>) -> CollectionReport {
        let mut summary = CollectionReport {
            collection: collection.to_string(),
            documents: items.len(),
            ..Default::default()
        };
        let mut legacy_ids = HashSet::new();

        for item in items {
            let Some(doc) = item.as_object() else {
                warnings.push(warning(collection, None, "entry is not a JSON object"));
                continue;
            };
            let converted = document::to_legacy(doc);
            let Some(legacy) = document::legacy_key(&converted) else {
                warnings.push(warning(collection, None, "document has no id"));
                continue;
            };
            legacy_ids.insert(legacy.clone());

            match self.store.upsert_by_legacy_id(collection, &converted) {
                Ok(UpsertOutcome::Inserted(_)) => summary.inserted += 1,
                Ok(UpsertOutcome::Updated(_)) => summary.updated += 1,
                Ok(UpsertOutcome::Unchanged(_)) => summary.unchanged += 1,
                Err(e) => {
                    tracing::warn!("Upsert error for {} legacyId={}: {}", collection, legacy, e);
                    warnings.push(warning(collection, Some(legacy), &e.to_string()));
                }
            }
        }

        if self.prune {
            match self.store.prune_legacy(collection, &legacy_ids) {
                Ok(0) => {}
                Ok(n) => {
                    tracing::info!("Pruned {} docs from {}", n, collection);
                    summary.pruned = n;
                }
                Err(e) => {
                    tracing::warn!("Prune error for {}: {}", collection, e);
                    warnings.push(warning(collection, None, &format!("prune failed: {}", e)));
                }
            }
        }

        summary
    }
}

fn warning(collection: Collection, legacy_id: Option<String>, message: &str) -> SyncWarning {
    SyncWarning {
        collection: collection.to_string(),
        legacy_id,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> DataFile {
        DataFile::parse(&value.to_string()).unwrap()
    }

    fn sample() -> DataFile {
        data(json!({
            "destinations": [
                {"id": 1, "name": "Cox's Bazar", "price": 100},
                {"id": 2, "name": "Sylhet", "price": 300}
            ],
            "users": [{"id": 1, "email": "a@b.c"}],
            "settings": [{"id": 1}],
            "meta": {"version": 2}
        }))
    }

    #[test]
    fn test_first_sync_inserts_everything() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = Synchronizer::new(&store).sync(&sample());

        assert_eq!(report.inserted(), 3);
        assert_eq!(report.skipped_collections, vec!["settings".to_string()]);
        assert!(report.warnings.is_empty());

        let cox = store.find_by_legacy_id(Collection::Destinations, "1").unwrap().unwrap();
        assert_eq!(cox["legacyId"], json!(1));
        assert!(cox.get("id").is_none());
    }

    #[test]
    fn test_sync_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(&store);
        sync.sync(&sample());

        let second = sync.sync(&sample());
        assert!(second.is_noop());
        assert_eq!(second.unchanged(), 3);
        assert_eq!(store.count_documents(Collection::Destinations).unwrap(), 2);
    }

    #[test]
    fn test_changed_document_is_updated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(&store);
        sync.sync(&sample());

        let edited = data(json!({"destinations": [
            {"id": 1, "name": "Cox's Bazar", "price": 120},
            {"id": 2, "name": "Sylhet", "price": 300}
        ]}));
        let report = sync.sync(&edited);
        assert_eq!(report.updated(), 1);
        assert_eq!(report.unchanged(), 1);

        let cox = store.find_by_legacy_id(Collection::Destinations, "1").unwrap().unwrap();
        assert_eq!(cox["price"], json!(120));
    }

    #[test]
    fn test_prune_removes_documents_missing_from_file() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(&store);
        sync.sync(&sample());

        let shrunk = data(json!({"destinations": [{"id": 2, "name": "Sylhet", "price": 300}]}));
        let report = sync.sync(&shrunk);
        assert_eq!(report.pruned(), 1);
        assert!(store.find_by_legacy_id(Collection::Destinations, "1").unwrap().is_none());
        // Collections absent from the file are not touched
        assert_eq!(store.count_documents(Collection::Users).unwrap(), 1);
    }

    #[test]
    fn test_no_prune_never_deletes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(&store).with_prune(false);
        sync.sync(&sample());

        let report = sync.sync(&data(json!({"destinations": []})));
        assert_eq!(report.pruned(), 0);
        assert_eq!(store.count_documents(Collection::Destinations).unwrap(), 2);
    }

    #[test]
    fn test_bad_documents_are_skipped_not_fatal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let report = Synchronizer::new(&store).sync(&data(json!({"services": [
            {"name": "no id"},
            "not an object",
            {"id": 5, "name": "ok"}
        ]})));

        assert_eq!(report.inserted(), 1);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().all(|w| w.collection == "services"));
    }

    #[test]
    fn test_zero_id_is_a_legacy_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sync = Synchronizer::new(&store);
        let report = sync.sync(&data(json!({"admin": [{"id": 0, "email": "root"}]})));

        assert_eq!(report.inserted(), 1);
        assert!(report.warnings.is_empty());
        let root = store.find_by_legacy_id(Collection::Admin, "0").unwrap().unwrap();
        assert_eq!(root["legacyId"], json!(0));

        // Kept by prune on the next pass
        assert!(sync.sync(&data(json!({"admin": [{"id": 0, "email": "root"}]}))).is_noop());
        assert_eq!(store.count_documents(Collection::Admin).unwrap(), 1);
    }

    #[test]
    fn test_documents_created_in_database_survive_prune() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_document(Collection::Users, document::into_document(json!({"email": "direct"})).unwrap())
            .unwrap();

        Synchronizer::new(&store).sync(&sample());
        assert_eq!(store.count_documents(Collection::Users).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, sample().to_pretty_string().unwrap()).unwrap();

        let store = SqliteStore::open_in_memory().unwrap();
        let report = Synchronizer::new(&store).sync_file(&FileStore::new(&path)).await.unwrap();
        assert_eq!(report.inserted(), 3);
    }
}
