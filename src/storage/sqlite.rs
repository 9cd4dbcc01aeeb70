//! SQLite storage implementation
//!
//! Documents are stored as JSON text, one row per document, keyed by a
//! generated `_id`. Row order (`seq`) is insertion order.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use crate::collection::Collection;
use crate::config::DatabaseTarget;
use crate::document::{self, DATABASE_ID, Document};
use crate::query::{ListPage, ListQuery, TEXT_FIELDS};
use crate::{Error, Result};
use super::{BackendKind, DocumentBackend, schema};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate an opaque 24 hex character document key
fn generate_id(collection: Collection) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let count = ID_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(collection.as_str().as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&count.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.finalize().to_hex()[..24].to_string()
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Result of an upsert keyed on legacy identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(String),
    Updated(String),
    Unchanged(String),
}

/// One row of the legacy identity mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMapping {
    pub collection: String,
    pub legacy_id: String,
    pub document_id: String,
    pub recorded_at: i64,
}

/// SQLite-backed document database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Open whatever the configured connection string points at
    pub fn open_target(target: &DatabaseTarget) -> Result<Self> {
        match target {
            DatabaseTarget::File(path) => Self::open(path),
            DatabaseTarget::Memory => Self::open_in_memory(),
        }
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_regexp(&conn)?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn();
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cheap liveness check
    pub fn ping(&self) -> Result<()> {
        let _: i64 = self.conn().query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(())
    }

    // ========== Document Operations ==========

    /// Filter, sort and paginate a collection in SQL
    pub fn list_documents(&self, collection: Collection, query: &ListQuery) -> Result<ListPage> {
        let mut where_sql = String::from("collection = ?");
        let mut args: Vec<SqlValue> = vec![collection.as_str().to_string().into()];

        if let Some(filter) = query.text_filter() {
            let Some(pattern) = filter.pattern() else {
                return Ok(ListPage {
                    items: Vec::new(),
                    total: query.is_paginated().then_some(0),
                });
            };
            let clauses: Vec<String> = TEXT_FIELDS
                .iter()
                .map(|field| {
                    format!(
                        "(json_type(body, '$.{0}') IN ('text', 'integer', 'real') AND json_extract(body, '$.{0}') REGEXP ?)",
                        field
                    )
                })
                .collect();
            where_sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
            let pattern = format!("(?i){}", pattern.as_str());
            for _ in TEXT_FIELDS {
                args.push(pattern.clone().into());
            }
        }

        let conn = self.conn();

        let total = if query.is_paginated() {
            let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", where_sql);
            let count: i64 = conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            Some(count as usize)
        } else {
            None
        };

        let mut sql = format!("SELECT id, body FROM documents WHERE {} ORDER BY ", where_sql);
        let mut select_args = args;
        match query.sort.as_deref() {
            Some(DATABASE_ID) => sql.push_str(&format!("id {}, ", query.order.as_sql())),
            Some(field) => {
                sql.push_str(&format!("json_extract(body, ?) {}, ", query.order.as_sql()));
                select_args.push(json_path(field).into());
            }
            None => {}
        }
        sql.push_str("seq ASC");

        if query.is_paginated() {
            sql.push_str(" LIMIT ? OFFSET ?");
            select_args.push((query.limit as i64).into());
            select_args.push((query.offset() as i64).into());
        }

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(select_args.iter()), row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ListPage { items, total })
    }

    /// Get a document by its database identity
    pub fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.conn()
            .query_row(
                "SELECT id, body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                row_to_document,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert a document under a fresh identity
    pub fn insert_document(&self, collection: Collection, body: Document) -> Result<Document> {
        let conn = self.conn();
        let id = insert_row(&conn, collection, body.clone())?;
        Ok(with_database_id(&id, body))
    }

    /// Merge `partial` over a stored document
    pub fn update_document(&self, collection: Collection, id: &str, partial: &Document) -> Result<Option<Document>> {
        let conn = self.conn();
        let existing: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw) = existing else {
            return Ok(None);
        };

        let mut merged = parse_body(&raw)?;
        document::merge(&mut merged, partial, &[DATABASE_ID]);
        write_body(&conn, id, &merged)?;
        Ok(Some(with_database_id(id, merged)))
    }

    /// Delete a document. Returns whether anything was removed.
    pub fn delete_document(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        tx.execute("DELETE FROM legacy_identities WHERE document_id = ?1", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Count documents in a collection
    pub fn count_documents(&self, collection: Collection) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ========== Legacy Identity Operations ==========

    /// Find a document by the file id it was imported from
    pub fn find_by_legacy_id(&self, collection: Collection, legacy_id: &str) -> Result<Option<Document>> {
        self.conn()
            .query_row(
                "SELECT id, body FROM documents WHERE collection = ?1 AND legacy_id = ?2",
                params![collection.as_str(), legacy_id],
                row_to_document,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert an already converted document, failing if its legacy id is
    /// already present in the collection
    pub fn import_document(&self, collection: Collection, doc: Document) -> Result<String> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let legacy = document::legacy_key(&doc);
        let id = insert_row(&tx, collection, doc)?;
        if let Some(legacy) = legacy {
            record_identity(&tx, collection, &legacy, &id)?;
        }
        tx.commit()?;
        Ok(id)
    }

    /// Insert or merge a converted document matched on its `legacyId`.
    ///
    /// Nothing is written when the merge would not change the stored body.
    pub fn upsert_by_legacy_id(&self, collection: Collection, doc: &Document) -> Result<UpsertOutcome> {
        let legacy = document::legacy_key(doc)
            .ok_or_else(|| Error::BadRequest("document has no legacyId".to_string()))?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT id, body FROM documents WHERE collection = ?1 AND legacy_id = ?2",
                params![collection.as_str(), legacy],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let outcome = match existing {
            None => {
                let id = insert_row(&tx, collection, doc.clone())?;
                record_identity(&tx, collection, &legacy, &id)?;
                UpsertOutcome::Inserted(id)
            }
            Some((id, raw)) => {
                let current = parse_body(&raw)?;
                let mut merged = current.clone();
                document::merge(&mut merged, doc, &[DATABASE_ID]);
                if merged == current {
                    UpsertOutcome::Unchanged(id)
                } else {
                    write_body(&tx, &id, &merged)?;
                    record_identity(&tx, collection, &legacy, &id)?;
                    UpsertOutcome::Updated(id)
                }
            }
        };
        tx.commit()?;
        Ok(outcome)
    }

    /// Delete documents of a collection whose legacy id is not in `keep`.
    /// Documents without a legacy id are left alone.
    pub fn prune_legacy(&self, collection: Collection, keep: &HashSet<String>) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let stale: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id, legacy_id FROM documents WHERE collection = ?1 AND legacy_id IS NOT NULL",
            )?;
            stmt.query_map([collection.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter(|(_, legacy)| !keep.contains(legacy))
            .map(|(id, _)| id)
            .collect()
        };

        for id in &stale {
            tx.execute("DELETE FROM documents WHERE id = ?1", [id])?;
            tx.execute("DELETE FROM legacy_identities WHERE document_id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Legacy identity mapping, optionally for one collection
    pub fn identity_mappings(&self, collection: Option<Collection>) -> Result<Vec<IdentityMapping>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT collection, legacy_id, document_id, recorded_at FROM legacy_identities
             WHERE ?1 IS NULL OR collection = ?1
             ORDER BY collection, CAST(legacy_id AS INTEGER), legacy_id",
        )?;
        let rows = stmt
            .query_map([collection.map(|c| c.as_str())], |row| {
                Ok(IdentityMapping {
                    collection: row.get(0)?,
                    legacy_id: row.get(1)?,
                    document_id: row.get(2)?,
                    recorded_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let mut collections = Vec::new();
        for c in Collection::all() {
            let legacy: i64 = self.conn().query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND legacy_id IS NOT NULL",
                [c.as_str()],
                |row| row.get(0),
            )?;
            collections.push(CollectionStats {
                collection: *c,
                documents: self.count_documents(*c)?,
                with_legacy_id: legacy as usize,
            });
        }
        Ok(DbStats { collections })
    }
}

/// SQLite has no built-in REGEXP implementation; `X REGEXP Y` calls
/// `regexp(Y, X)`. Non-text values other than numbers never match.
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|text| regex.is_match(text))
                    .unwrap_or(false),
                ValueRef::Integer(i) => regex.is_match(&i.to_string()),
                ValueRef::Real(f) => regex.is_match(&f.to_string()),
                _ => false,
            };
            Ok(is_match)
        },
    )?;
    Ok(())
}

/// `$."field"` so field names with dots address a top-level key
fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', ""))
}

fn insert_row(conn: &Connection, collection: Collection, mut body: Document) -> Result<String> {
    body.remove(DATABASE_ID);
    let id = generate_id(collection);
    let legacy = document::legacy_key(&body);
    conn.execute(
        "INSERT INTO documents (id, collection, legacy_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, collection.as_str(), legacy, serde_json::to_string(&body)?],
    )?;
    Ok(id)
}

fn write_body(conn: &Connection, id: &str, body: &Document) -> Result<()> {
    let mut body = body.clone();
    body.remove(DATABASE_ID);
    conn.execute(
        "UPDATE documents SET body = ?1, legacy_id = ?2 WHERE id = ?3",
        params![serde_json::to_string(&body)?, document::legacy_key(&body), id],
    )?;
    Ok(())
}

fn record_identity(conn: &Connection, collection: Collection, legacy_id: &str, document_id: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO legacy_identities (collection, legacy_id, document_id, recorded_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(collection, legacy_id) DO UPDATE SET
            document_id = excluded.document_id,
            recorded_at = excluded.recorded_at
        "#,
        params![collection.as_str(), legacy_id, document_id, unix_seconds()],
    )?;
    Ok(())
}

fn parse_body(raw: &str) -> Result<Document> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidDataFile("stored body is not an object".to_string())),
    }
}

fn with_database_id(id: &str, body: Document) -> Document {
    let mut doc = Document::new();
    doc.insert(DATABASE_ID.to_string(), Value::String(id.to_string()));
    doc.extend(body.into_iter().filter(|(k, _)| k != DATABASE_ID));
    doc
}

/// Helper to convert a row (id, body) to a Document
fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let raw: String = row.get(1)?;
    let body = parse_body(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(with_database_id(&id, body))
}

#[async_trait]
impl DocumentBackend for SqliteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Database
    }

    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<ListPage> {
        self.list_documents(collection, query)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        self.get_document(collection, id)?.ok_or(Error::NotFound)
    }

    async fn create(&self, collection: Collection, body: Document) -> Result<Document> {
        self.insert_document(collection, body)
    }

    async fn update(&self, collection: Collection, id: &str, partial: Document) -> Result<Document> {
        self.update_document(collection, id, &partial)?.ok_or(Error::NotFound)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        if self.delete_document(collection, id)? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }
}

/// Per-collection counts
#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub collection: Collection,
    pub documents: usize,
    pub with_legacy_id: usize,
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub collections: Vec<CollectionStats>,
}

impl DbStats {
    pub fn total_documents(&self) -> usize {
        self.collections.iter().map(|c| c.documents).sum()
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for c in &self.collections {
            writeln!(f, "  {}: {} ({} imported)", c.collection, c.documents, c.with_legacy_id)?;
        }
        write!(f, "  Total: {}", self.total_documents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortOrder;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        document::into_document(value).unwrap()
    }

    fn names(page: &ListPage) -> Vec<String> {
        page.items.iter().map(|d| d["name"].as_str().unwrap().to_string()).collect()
    }

    #[test]
    fn test_document_crud() {
        let store = SqliteStore::open_in_memory().unwrap();

        let created = store
            .insert_document(Collection::Destinations, doc(json!({"name": "Sajek", "price": 80})))
            .unwrap();
        let id = created["_id"].as_str().unwrap().to_string();
        assert_eq!(id.len(), 24);

        let fetched = store.get_document(Collection::Destinations, &id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(Value::Object(fetched), json!({"_id": id, "name": "Sajek", "price": 80}));

        // Identity is scoped to the collection
        assert!(store.get_document(Collection::Services, &id).unwrap().is_none());

        assert!(store.delete_document(Collection::Destinations, &id).unwrap());
        assert!(store.get_document(Collection::Destinations, &id).unwrap().is_none());
        assert!(!store.delete_document(Collection::Destinations, &id).unwrap());
    }

    #[test]
    fn test_update_is_partial_merge() {
        let store = SqliteStore::open_in_memory().unwrap();
        let created = store.insert_document(Collection::Users, doc(json!({"a": 0, "b": 2}))).unwrap();
        let id = created["_id"].as_str().unwrap();

        let merged = store
            .update_document(Collection::Users, id, &doc(json!({"a": 1, "_id": "forged"})))
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(merged), json!({"_id": id, "a": 1, "b": 2}));

        assert!(store.update_document(Collection::Users, "missing", &doc(json!({}))).unwrap().is_none());
    }

    #[test]
    fn test_list_filters_sorts_and_paginates() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (name, price) in [("Sylhet", 300), ("Cox's Bazar", 100), ("Bandarban", 200), ("Rangamati", 50), ("Sundarbans", 250)] {
            store
                .insert_document(Collection::Destinations, doc(json!({"name": name, "price": price})))
                .unwrap();
        }

        let all = store.list_documents(Collection::Destinations, &ListQuery::new()).unwrap();
        assert_eq!(names(&all)[0], "Sylhet");
        assert_eq!(all.total, None);

        let sorted = store
            .list_documents(Collection::Destinations, &ListQuery::new().with_sort("price", SortOrder::Desc))
            .unwrap();
        assert_eq!(names(&sorted), vec!["Sylhet", "Sundarbans", "Bandarban", "Cox's Bazar", "Rangamati"]);

        let page = store
            .list_documents(
                Collection::Destinations,
                &ListQuery::new().with_sort("price", SortOrder::Asc).with_page(2, 2),
            )
            .unwrap();
        assert_eq!(names(&page), vec!["Bandarban", "Sundarbans"]);
        assert_eq!(page.total, Some(5));

        let found = store
            .list_documents(Collection::Destinations, &ListQuery::new().with_text("SUN"))
            .unwrap();
        assert_eq!(names(&found), vec!["Sundarbans"]);
    }

    #[test]
    fn test_text_search_skips_non_scalar_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_document(Collection::Services, doc(json!({"name": true}))).unwrap();
        store.insert_document(Collection::Services, doc(json!({"name": {"label": "1"}}))).unwrap();
        store.insert_document(Collection::Services, doc(json!({"name": 1, "tag": "n"}))).unwrap();

        let found = store
            .list_documents(Collection::Services, &ListQuery::new().with_text("1"))
            .unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0]["tag"], json!("n"));

        let none = store
            .list_documents(Collection::Services, &ListQuery::new().with_text("true"))
            .unwrap();
        assert!(none.items.is_empty());

        // Same answer from the in-memory evaluation
        let all = store.list_documents(Collection::Services, &ListQuery::new()).unwrap();
        let in_memory = crate::query::apply(all.items, &ListQuery::new().with_text("1"));
        assert_eq!(in_memory.items, found.items);
    }

    #[test]
    fn test_upsert_by_legacy_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = doc(json!({"legacyId": 1, "name": "Hotel"}));

        let inserted = store.upsert_by_legacy_id(Collection::Services, &first).unwrap();
        assert!(matches!(inserted, UpsertOutcome::Inserted(_)));
        assert!(matches!(
            store.upsert_by_legacy_id(Collection::Services, &first).unwrap(),
            UpsertOutcome::Unchanged(_)
        ));

        let changed = doc(json!({"legacyId": "1", "name": "Resort"}));
        let updated = store.upsert_by_legacy_id(Collection::Services, &changed).unwrap();
        assert!(matches!(updated, UpsertOutcome::Updated(_)));
        assert_eq!(store.count_documents(Collection::Services).unwrap(), 1);

        let stored = store.find_by_legacy_id(Collection::Services, "1").unwrap().unwrap();
        assert_eq!(stored["name"], json!("Resort"));

        let mappings = store.identity_mappings(Some(Collection::Services)).unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(Some(mappings[0].document_id.as_str()), stored["_id"].as_str());
    }

    #[test]
    fn test_import_rejects_duplicate_legacy_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let converted = doc(json!({"legacyId": 3, "name": "x"}));
        store.import_document(Collection::Users, converted.clone()).unwrap();
        assert!(store.import_document(Collection::Users, converted).is_err());

        // Documents without legacy id never collide
        store.import_document(Collection::Users, doc(json!({"name": "a"}))).unwrap();
        store.import_document(Collection::Users, doc(json!({"name": "a"}))).unwrap();
        assert_eq!(store.count_documents(Collection::Users).unwrap(), 3);
    }

    #[test]
    fn test_prune_keeps_listed_and_unimported() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 1..=3 {
            store.upsert_by_legacy_id(Collection::Admin, &doc(json!({"legacyId": i}))).unwrap();
        }
        store.insert_document(Collection::Admin, doc(json!({"name": "direct"}))).unwrap();

        let keep: HashSet<String> = ["1".to_string(), "3".to_string()].into_iter().collect();
        assert_eq!(store.prune_legacy(Collection::Admin, &keep).unwrap(), 1);
        assert_eq!(store.count_documents(Collection::Admin).unwrap(), 3);
        assert!(store.find_by_legacy_id(Collection::Admin, "2").unwrap().is_none());
        assert_eq!(store.identity_mappings(None).unwrap().len(), 2);
    }

    #[test]
    fn test_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_document(Collection::Users, doc(json!({"name": "a"}))).unwrap();
        store.upsert_by_legacy_id(Collection::Users, &doc(json!({"legacyId": 1}))).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_documents(), 2);
        let users = stats.collections.iter().find(|c| c.collection == Collection::Users).unwrap();
        assert_eq!(users.with_legacy_id, 1);
    }
}
