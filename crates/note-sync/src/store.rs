//! LocalStore trait abstraction for the durable local database.
//!
//! Implementations:
//! - `InMemoryStore` - For testing and embedding
//! - `JsonStore` (in note-sync-cli) - One JSON document on disk, atomic per call
//!
//! Every method is an independent atomic commit. No transaction spans several
//! records; the sync pipelines order their writes so any prefix is safe to retry.

use crate::mapping::RemoteMapping;
use crate::note::Note;
use crate::outbox::OutboxOp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt store data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable local storage consumed by the sync core and the editing layer.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Get a note (tombstones included) by id
    async fn get_note(&self, note_id: &str) -> Result<Option<Note>>;

    /// Insert or replace a note
    async fn put_note(&self, note: &Note) -> Result<()>;

    /// All stored notes, tombstones included
    async fn list_notes(&self) -> Result<Vec<Note>>;

    /// Append an operation to the outbox
    async fn enqueue_op(&self, op: &OutboxOp) -> Result<()>;

    /// Queued operations ordered by enqueue time
    async fn queued_ops(&self) -> Result<Vec<OutboxOp>>;

    /// Remove a queued operation. Removing an unknown id is not an error.
    async fn remove_op(&self, op_id: &str) -> Result<()>;

    /// Get the remote mapping for a note
    async fn get_mapping(&self, note_id: &str) -> Result<Option<RemoteMapping>>;

    /// Insert or replace the remote mapping for `mapping.note_id`
    async fn put_mapping(&self, mapping: &RemoteMapping) -> Result<()>;

    /// Delete the remote mapping for a note. Deleting an absent mapping is not an error.
    async fn delete_mapping(&self, note_id: &str) -> Result<()>;

    /// Get a meta value by key
    async fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// Set a meta value
    async fn put_meta(&self, key: &str, value: &str) -> Result<()>;
}

/// Every table of the local database as one serializable value.
///
/// Shared by `InMemoryStore` and file-backed stores that persist the whole
/// database as a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreTables {
    #[serde(default)]
    pub notes: BTreeMap<String, Note>,
    /// Outbox in insertion order
    #[serde(default)]
    pub outbox: Vec<OutboxOp>,
    #[serde(default)]
    pub mappings: BTreeMap<String, RemoteMapping>,
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl StoreTables {
    pub fn queued_ops(&self) -> Vec<OutboxOp> {
        let mut ops = self.outbox.clone();
        ops.sort_by_key(|op| op.queued_at_ms);
        ops
    }

    pub fn remove_op(&mut self, op_id: &str) {
        self.outbox.retain(|op| op.op_id != op_id);
    }
}

/// In-memory store for testing
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<StoreTables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every table, for assertions
    pub fn snapshot(&self) -> StoreTables {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
        Ok(self.read().notes.get(note_id).cloned())
    }

    async fn put_note(&self, note: &Note) -> Result<()> {
        self.write()
            .notes
            .insert(note.note_id.clone(), note.clone());
        Ok(())
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.read().notes.values().cloned().collect())
    }

    async fn enqueue_op(&self, op: &OutboxOp) -> Result<()> {
        self.write().outbox.push(op.clone());
        Ok(())
    }

    async fn queued_ops(&self) -> Result<Vec<OutboxOp>> {
        Ok(self.read().queued_ops())
    }

    async fn remove_op(&self, op_id: &str) -> Result<()> {
        self.write().remove_op(op_id);
        Ok(())
    }

    async fn get_mapping(&self, note_id: &str) -> Result<Option<RemoteMapping>> {
        Ok(self.read().mappings.get(note_id).cloned())
    }

    async fn put_mapping(&self, mapping: &RemoteMapping) -> Result<()> {
        self.write()
            .mappings
            .insert(mapping.note_id.clone(), mapping.clone());
        Ok(())
    }

    async fn delete_mapping(&self, note_id: &str) -> Result<()> {
        self.write().mappings.remove(note_id);
        Ok(())
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read().meta.get(key).cloned())
    }

    async fn put_meta(&self, key: &str, value: &str) -> Result<()> {
        self.write().meta.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// Lets a store be shared between a NoteService and a SyncEngine
#[async_trait]
impl<T: LocalStore + ?Sized> LocalStore for std::sync::Arc<T> {
    async fn get_note(&self, note_id: &str) -> Result<Option<Note>> {
        (**self).get_note(note_id).await
    }

    async fn put_note(&self, note: &Note) -> Result<()> {
        (**self).put_note(note).await
    }

    async fn list_notes(&self) -> Result<Vec<Note>> {
        (**self).list_notes().await
    }

    async fn enqueue_op(&self, op: &OutboxOp) -> Result<()> {
        (**self).enqueue_op(op).await
    }

    async fn queued_ops(&self) -> Result<Vec<OutboxOp>> {
        (**self).queued_ops().await
    }

    async fn remove_op(&self, op_id: &str) -> Result<()> {
        (**self).remove_op(op_id).await
    }

    async fn get_mapping(&self, note_id: &str) -> Result<Option<RemoteMapping>> {
        (**self).get_mapping(note_id).await
    }

    async fn put_mapping(&self, mapping: &RemoteMapping) -> Result<()> {
        (**self).put_mapping(mapping).await
    }

    async fn delete_mapping(&self, note_id: &str) -> Result<()> {
        (**self).delete_mapping(note_id).await
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        (**self).get_meta(key).await
    }

    async fn put_meta(&self, key: &str, value: &str) -> Result<()> {
        (**self).put_meta(key, value).await
    }
}
