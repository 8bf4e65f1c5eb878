//! Document records kept in a sidecar JSON file next to the index.
//!
//! The whole map is read and rewritten on every mutation; a mutex keeps the
//! read-modify-write cycles of one process from interleaving.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use docqa_core::traits::DocumentStore;
use docqa_core::types::DocumentRecord;
use docqa_core::{Error, Result};

type RecordMap = BTreeMap<String, DocumentRecord>;

pub struct JsonDocumentStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonDocumentStore {
    /// Creates the parent directory if needed. A missing file reads as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock.lock().map_err(|_| Error::Operation("document registry lock poisoned".into()))
    }

    fn read(&self) -> Result<RecordMap> {
        if !self.path.exists() {
            return Ok(RecordMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(RecordMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, records: &RecordMap) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), records = records.len(), "registry written");
        Ok(())
    }
}

impl DocumentStore for JsonDocumentStore {
    fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let _guard = self.guard()?;
        Ok(self.read()?.remove(id))
    }

    fn put(&self, record: DocumentRecord) -> Result<()> {
        let _guard = self.guard()?;
        let mut records = self.read()?;
        records.insert(record.id.clone(), record);
        self.write(&records)
    }

    fn remove(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let _guard = self.guard()?;
        let mut records = self.read()?;
        let removed = records.remove(id);
        if removed.is_some() {
            self.write(&records)?;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<DocumentRecord>> {
        let _guard = self.guard()?;
        let mut records: Vec<DocumentRecord> = self.read()?.into_values().collect();
        records.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn record(id: &str, minutes_ago: i64) -> DocumentRecord {
        DocumentRecord {
            id: id.into(),
            filename: format!("{id}.pdf"),
            upload_timestamp: Utc::now() - Duration::minutes(minutes_ago),
            page_count: 3,
            chunk_count: 7,
        }
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("nested/documents_metadata.json");
        let store = JsonDocumentStore::open(&path).expect("open");
        store.put(record("doc_1", 0)).expect("put");

        let reopened = JsonDocumentStore::open(&path).expect("reopen");
        let got = reopened.get("doc_1").expect("get").expect("present");
        assert_eq!(got.chunk_count, 7);
        assert_eq!(got.filename, "doc_1.pdf");
    }

    #[test]
    fn list_is_newest_first() {
        let tmp = TempDir::new().expect("tmp");
        let store = JsonDocumentStore::open(tmp.path().join("r.json")).expect("open");
        store.put(record("old", 30)).expect("put");
        store.put(record("new", 1)).expect("put");
        store.put(record("mid", 10)).expect("put");
        let ids: Vec<String> = store.list().expect("list").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn remove_reports_what_was_there() {
        let tmp = TempDir::new().expect("tmp");
        let store = JsonDocumentStore::open(tmp.path().join("r.json")).expect("open");
        assert!(store.remove("nope").expect("remove").is_none());
        store.put(record("doc_1", 0)).expect("put");
        assert_eq!(store.remove("doc_1").expect("remove").map(|r| r.id), Some("doc_1".to_string()));
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("r.json");
        fs::write(&path, "{ not json").expect("write");
        let store = JsonDocumentStore::open(&path).expect("open");
        assert!(matches!(store.list(), Err(Error::Operation(_))));
    }
}
