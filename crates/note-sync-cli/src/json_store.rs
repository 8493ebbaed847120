//! File-backed LocalStore: the whole local database as one JSON document.

use crate::json_file::{self, JsonFileError};

use async_trait::async_trait;
use note_sync::RemoteMapping;
use note_sync::note::Note;
use note_sync::outbox::OutboxOp;
use note_sync::store::{LocalStore, Result, StoreError, StoreTables};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File name of the local database within a data directory
pub const STORE_FILE: &str = "store.json";

impl From<JsonFileError> for StoreError {
    fn from(e: JsonFileError) -> Self {
        match e {
            JsonFileError::Io { .. } => StoreError::Io(e.to_string()),
            JsonFileError::Json { .. } => StoreError::Corrupt(e.to_string()),
        }
    }
}

/// Local store persisted to `<data-dir>/store.json`.
///
/// Each call loads the document, applies one change, and saves it before
/// returning, so every method is its own durable commit.
pub struct JsonStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store at the standard file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreTables) -> T + Send) -> Result<T> {
        let _guard = self.lock.lock().await;
        let tables: StoreTables = json_file::load_or_default(&self.path).await?;
        Ok(f(&tables))
    }

    async fn modify(&self, f: impl FnOnce(&mut StoreTables) + Send) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tables: StoreTables = json_file::load_or_default(&self.path).await?;
        f(&mut tables);
        json_file::save_atomic(&self.path, &tables).await?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for JsonStore {
    async fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
        self.read(|t| t.notes.get(note_id).cloned()).await
    }

    async fn put_note(&self, note: &Note) -> Result<()> {
        self.modify(|t| {
            t.notes.insert(note.note_id.clone(), note.clone());
        })
        .await
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        self.read(|t| t.notes.values().cloned().collect()).await
    }

    async fn enqueue_op(&self, op: &OutboxOp) -> Result<()> {
        self.modify(|t| t.outbox.push(op.clone())).await
    }

    async fn queued_ops(&self) -> Result<Vec<OutboxOp>> {
        self.read(StoreTables::queued_ops).await
    }

    async fn remove_op(&self, op_id: &str) -> Result<()> {
        self.modify(|t| t.remove_op(op_id)).await
    }

    async fn get_mapping(&self, note_id: &str) -> Result<Option<RemoteMapping>> {
        self.read(|t| t.mappings.get(note_id).cloned()).await
    }

    async fn put_mapping(&self, mapping: &RemoteMapping) -> Result<()> {
        self.modify(|t| {
            t.mappings.insert(mapping.note_id.clone(), mapping.clone());
        })
        .await
    }

    async fn delete_mapping(&self, note_id: &str) -> Result<()> {
        self.modify(|t| {
            t.mappings.remove(note_id);
        })
        .await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.read(|t| t.meta.get(key).cloned()).await
    }

    async fn put_meta(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|t| {
            t.meta.insert(key.to_string(), value.to_string());
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_sync::outbox::OpKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonStore::in_dir(dir.path());
            store.put_note(&Note::new("a", "t", "b", 5)).await.unwrap();
            store
                .enqueue_op(&OutboxOp::new(OpKind::Upsert, "a", 5))
                .await
                .unwrap();
            store
                .put_mapping(&RemoteMapping::new("a", "file-1", None))
                .await
                .unwrap();
            store.put_meta("sync.changesCursor", "cursor-3").await.unwrap();
        }

        let reopened = JsonStore::in_dir(dir.path());
        assert_eq!(reopened.get_note("a").await.unwrap().unwrap().title, "t");
        assert_eq!(reopened.queued_ops().await.unwrap().len(), 1);
        assert_eq!(
            reopened.get_mapping("a").await.unwrap().unwrap().drive_file_id,
            "file-1"
        );
        assert_eq!(
            reopened.get_meta("sync.changesCursor").await.unwrap().as_deref(),
            Some("cursor-3")
        );
    }

    #[tokio::test]
    async fn test_fresh_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::in_dir(&dir.path().join("not-yet-created"));
        assert!(store.list_notes().await.unwrap().is_empty());
        assert!(store.queued_ops().await.unwrap().is_empty());
        store.delete_mapping("nothing").await.unwrap();
        store.remove_op("nothing").await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "[1, 2").unwrap();
        let store = JsonStore::in_dir(dir.path());

        assert!(matches!(
            store.get_note("a").await,
            Err(StoreError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_removes_only_the_named_op() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::in_dir(dir.path());
        let first = OutboxOp::new(OpKind::Upsert, "a", 1);
        let second = OutboxOp::new(OpKind::Delete, "a", 2);
        store.enqueue_op(&second).await.unwrap();
        store.enqueue_op(&first).await.unwrap();

        store.remove_op(&first.op_id).await.unwrap();

        assert_eq!(store.queued_ops().await.unwrap(), vec![second]);
    }
}
