//! JSON file storage
//!
//! The whole data file is one JSON object mapping collection names to
//! arrays of documents. Every mutation reads the file, changes it in
//! memory and replaces it wholesale. A single writer lock is held for the
//! full read-modify-write so concurrent requests are applied one at a time.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use crate::collection::Collection;
use crate::document::{self, Document, FILE_ID};
use crate::query::{self, ListPage, ListQuery};
use crate::{Error, Result};
use super::{BackendKind, DocumentBackend};

/// In-memory image of the data file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFile {
    root: Map<String, Value>,
}

impl DataFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse file contents; empty contents are an empty data set
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(Error::InvalidDataFile("top level must be a JSON object".to_string())),
        }
    }

    pub fn to_pretty_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    /// All top-level entries, including ones that are not known collections
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Object documents of a collection, in file order
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        match self.root.get(collection.as_str()) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Raw entries of a collection, turning a missing or malformed value
    /// into an empty array
    fn entries_mut(&mut self, collection: Collection) -> &mut Vec<Value> {
        let slot = self
            .root
            .entry(collection.as_str().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("slot was just made an array"),
        }
    }

    fn position(&self, collection: Collection, id: &str) -> Option<usize> {
        match self.root.get(collection.as_str()) {
            Some(Value::Array(items)) => items.iter().position(|v| {
                v.as_object()
                    .and_then(document::file_key)
                    .is_some_and(|key| key == id)
            }),
            _ => None,
        }
    }
}

/// Storage backed by a single JSON file
pub struct FileStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current file; a missing file is an empty data set
    pub async fn load(&self) -> Result<DataFile> {
        let _guard = self.writer.lock().await;
        self.read().await
    }

    /// Read the current file, failing when it does not exist
    pub async fn load_existing(&self) -> Result<DataFile> {
        let _guard = self.writer.lock().await;
        let raw = tokio::fs::read_to_string(&self.path).await?;
        DataFile::parse(&raw)
    }

    async fn read(&self) -> Result<DataFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => DataFile::parse(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DataFile::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file and rename it over the data file
    async fn write(&self, data: &DataFile) -> Result<()> {
        let contents = data.to_pretty_string()?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for FileStore {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<ListPage> {
        let data = self.load().await?;
        Ok(query::apply(data.documents(collection), query))
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        let data = self.load().await?;
        data.documents(collection)
            .into_iter()
            .find(|d| document::file_key(d).is_some_and(|key| key == id))
            .ok_or(Error::NotFound)
    }

    async fn create(&self, collection: Collection, body: Document) -> Result<Document> {
        let _guard = self.writer.lock().await;
        let mut data = self.read().await?;

        let id = document::next_file_id(&data.documents(collection))?;
        let mut stored = body;
        stored.insert(FILE_ID.to_string(), Value::from(id));

        data.entries_mut(collection).push(Value::Object(stored.clone()));
        self.write(&data).await?;
        tracing::debug!("Created {}/{} in {}", collection, id, self.path.display());
        Ok(stored)
    }

    async fn update(&self, collection: Collection, id: &str, partial: Document) -> Result<Document> {
        let _guard = self.writer.lock().await;
        let mut data = self.read().await?;

        let idx = data.position(collection, id).ok_or(Error::NotFound)?;
        let entry = &mut data.entries_mut(collection)[idx];
        let mut merged = entry.as_object().cloned().unwrap_or_default();
        document::merge(&mut merged, &partial, &[FILE_ID]);
        *entry = Value::Object(merged.clone());

        self.write(&data).await?;
        Ok(merged)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut data = self.read().await?;

        let idx = data.position(collection, id).ok_or(Error::NotFound)?;
        data.entries_mut(collection).remove(idx);

        self.write(&data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        document::into_document(value).unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> FileStore {
        FileStore::new(dir.path().join("db.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let page = store.list(Collection::Users, &ListQuery::new()).await.unwrap();
        assert!(page.items.is_empty());
        assert!(store.load_existing().await.is_err());
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let created = store
            .create(Collection::Destinations, doc(json!({"name": "Sajek", "price": 80})))
            .await
            .unwrap();
        assert_eq!(created["id"], json!(1));

        let fetched = store.get(Collection::Destinations, "1").await.unwrap();
        assert_eq!(Value::Object(fetched), json!({"name": "Sajek", "price": 80, "id": 1}));
    }

    #[tokio::test]
    async fn test_ids_are_max_plus_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        for i in 0..3 {
            store.create(Collection::Services, doc(json!({"n": i}))).await.unwrap();
        }
        store.delete(Collection::Services, "2").await.unwrap();
        let next = store.create(Collection::Services, doc(json!({"n": 3}))).await.unwrap();
        assert_eq!(next["id"], json!(4));

        store.delete(Collection::Services, "4").await.unwrap();
        let reused = store.create(Collection::Services, doc(json!({"n": 4}))).await.unwrap();
        assert_eq!(reused["id"], json!(4));
    }

    #[tokio::test]
    async fn test_create_refuses_when_ids_are_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let before = r#"{"users":[{"id":18446744073709551615}]}"#;
        std::fs::write(&path, before).unwrap();
        let store = FileStore::new(&path);

        let result = store.create(Collection::Users, doc(json!({"name": "late"}))).await;
        assert!(matches!(result, Err(Error::InvalidDataFile(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.create(Collection::Users, doc(json!({"a": 0, "b": 2}))).await.unwrap();
        let merged = store
            .update(Collection::Users, "1", doc(json!({"a": 1, "id": 99})))
            .await
            .unwrap();
        assert_eq!(Value::Object(merged), json!({"a": 1, "b": 2, "id": 1}));

        let missing = store.update(Collection::Users, "42", doc(json!({"a": 1}))).await;
        assert!(matches!(missing, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.create(Collection::Admin, doc(json!({"email": "a@b.c"}))).await.unwrap();
        store.delete(Collection::Admin, "1").await.unwrap();
        assert!(matches!(store.get(Collection::Admin, "1").await, Err(Error::NotFound)));
        assert!(matches!(store.delete(Collection::Admin, "1").await, Err(Error::NotFound)));
    }

    #[tokio::test]
    async fn test_lookup_falls_back_to_legacy_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            r#"{"users": [{"_id": "abc", "name": "x"}, {"legacyId": 7, "name": "y"}], "notes": 3}"#,
        )
        .unwrap();
        let store = FileStore::new(&path);

        assert_eq!(store.get(Collection::Users, "abc").await.unwrap()["name"], json!("x"));
        assert_eq!(store.get(Collection::Users, "7").await.unwrap()["name"], json!("y"));

        // Mutations keep unrelated top-level keys
        store.delete(Collection::Users, "abc").await.unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["notes"], json!(3));
        assert_eq!(raw["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(Collection::ServiceBookings, doc(json!({"seat": i}))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let page = store.list(Collection::ServiceBookings, &ListQuery::new()).await.unwrap();
        let mut ids: Vec<u64> = page.items.iter().map(|d| d["id"].as_u64().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileStore::new(&path);
        assert!(store.list(Collection::Users, &ListQuery::new()).await.is_err());
    }
}
