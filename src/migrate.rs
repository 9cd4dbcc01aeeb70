//! One-shot import of the data file into the database

use serde_json::Value;
use crate::collection::Collection;
use crate::document;
use crate::storage::{DataFile, SqliteStore};
use crate::sync::SyncWarning;

#[derive(Debug, Clone, Default)]
pub struct MigrateReport {
    /// (collection, documents imported)
    pub imported: Vec<(Collection, usize)>,
    pub skipped_collections: Vec<String>,
    pub warnings: Vec<SyncWarning>,
}

impl MigrateReport {
    pub fn total_imported(&self) -> usize {
        self.imported.iter().map(|(_, n)| n).sum()
    }
}

/// Insert every document of every known collection, renaming `id` to
/// `legacyId`. Inserts are independent: a failing document (for example
/// one imported by an earlier run) is logged and the rest still go in.
pub fn migrate(data: &DataFile, store: &SqliteStore) -> MigrateReport {
    let mut report = MigrateReport::default();

    for (name, value) in data.entries() {
        let Value::Array(items) = value else {
            continue;
        };
        let Ok(collection) = name.parse::<Collection>() else {
            tracing::info!("Skipping collection {} (no matching collection)", name);
            report.skipped_collections.push(name.to_string());
            continue;
        };

        tracing::info!("Importing {} docs into {} ...", items.len(), collection);
        let mut imported = 0;
        for item in items {
            let Some(doc) = item.as_object() else {
                report.warnings.push(SyncWarning {
                    collection: collection.to_string(),
                    legacy_id: None,
                    message: "entry is not a JSON object".to_string(),
                });
                continue;
            };
            let converted = document::to_legacy(doc);
            let legacy = document::legacy_key(&converted);
            match store.import_document(collection, converted) {
                Ok(_) => imported += 1,
                Err(e) => {
                    tracing::warn!(
                        "Warning while inserting into {} (legacyId={}): {}",
                        collection,
                        legacy.as_deref().unwrap_or("-"),
                        e
                    );
                    report.warnings.push(SyncWarning {
                        collection: collection.to_string(),
                        legacy_id: legacy,
                        message: e.to_string(),
                    });
                }
            }
        }
        tracing::info!("Done {} ({} imported)", collection, imported);
        report.imported.push((collection, imported));
    }

    report
}
