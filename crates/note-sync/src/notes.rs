//! NoteService: the editing layer over the local store.
//!
//! Every committed mutation writes the note first and then appends an outbox
//! operation, so a crash between the two leaves an edit that simply isn't
//! queued yet; it never leaves an operation pointing at an unwritten edit.

use crate::clock::{Clock, SystemClock};
use crate::note::Note;
use crate::outbox::{self, OpKind};
use crate::store::{LocalStore, StoreError};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, NoteError>;

pub struct NoteService<S: LocalStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: LocalStore> NoteService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A timestamp strictly after `previous`, so every edit is newer than the last
    fn next_timestamp(&self, previous: i64) -> i64 {
        self.clock.now_ms().max(previous + 1)
    }

    pub async fn create(&self, title: &str, body: &str) -> Result<Note> {
        let note = Note::new(Uuid::new_v4().to_string(), title, body, self.clock.now_ms());
        self.commit(&note, OpKind::Upsert).await?;
        debug!("Created note {}", note.note_id);
        Ok(note)
    }

    /// Replace the title and/or body of a live note.
    pub async fn update(&self, note_id: &str, title: Option<&str>, body: Option<&str>) -> Result<Note> {
        let mut note = self.live(note_id).await?;
        if let Some(title) = title {
            note.title = title.to_string();
        }
        if let Some(body) = body {
            note.body = body.to_string();
        }
        note.updated_at_ms = self.next_timestamp(note.updated_at_ms);
        self.commit(&note, OpKind::Upsert).await?;
        Ok(note)
    }

    /// Tombstone a live note and queue its remote deletion.
    pub async fn delete(&self, note_id: &str) -> Result<Note> {
        let mut note = self.live(note_id).await?;
        let now = self.next_timestamp(note.updated_at_ms);
        note.updated_at_ms = now;
        note.deleted_at_ms = Some(now);
        self.commit(&note, OpKind::Delete).await?;
        debug!("Deleted note {}", note_id);
        Ok(note)
    }

    /// A note by id, unless it is missing or tombstoned
    pub async fn get(&self, note_id: &str) -> Result<Option<Note>> {
        Ok(self
            .store
            .get_note(note_id)
            .await?
            .filter(|note| !note.is_deleted()))
    }

    /// Live notes, newest first, optionally filtered by a case-insensitive
    /// substring of the title or body.
    pub async fn list(&self, filter: Option<&str>) -> Result<Vec<Note>> {
        let needle = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let mut notes: Vec<Note> = self
            .store
            .list_notes()
            .await?
            .into_iter()
            .filter(|note| !note.is_deleted())
            .filter(|note| match &needle {
                Some(needle) => {
                    note.title.to_lowercase().contains(needle)
                        || note.body.to_lowercase().contains(needle)
                }
                None => true,
            })
            .collect();
        notes.sort_by(|a, b| {
            b.updated_at_ms
                .cmp(&a.updated_at_ms)
                .then_with(|| a.note_id.cmp(&b.note_id))
        });
        Ok(notes)
    }

    async fn live(&self, note_id: &str) -> Result<Note> {
        self.get(note_id)
            .await?
            .ok_or_else(|| NoteError::NotFound(note_id.to_string()))
    }

    async fn commit(&self, note: &Note, kind: OpKind) -> Result<()> {
        self.store.put_note(note).await?;
        outbox::enqueue(&self.store, kind, &note.note_id, note.updated_at_ms).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemoryStore;

    fn service(clock: &Arc<ManualClock>) -> NoteService<InMemoryStore> {
        NoteService::new(InMemoryStore::new()).with_clock(Arc::clone(clock) as Arc<dyn Clock>)
    }

    #[tokio::test]
    async fn test_create_queues_upsert() {
        let clock = Arc::new(ManualClock::new(100));
        let notes = service(&clock);

        let note = notes.create("Groceries", "milk").await.unwrap();
        assert_eq!(note.updated_at_ms, 100);

        let ops = notes.store().queued_ops().await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OpKind::Upsert);
        assert_eq!(ops[0].note_id, note.note_id);
    }

    #[tokio::test]
    async fn test_update_bumps_timestamp_even_with_stalled_clock() {
        let clock = Arc::new(ManualClock::new(100));
        let notes = service(&clock);
        let note = notes.create("t", "b").await.unwrap();

        let edited = notes.update(&note.note_id, None, Some("new body")).await.unwrap();
        assert_eq!(edited.title, "t");
        assert_eq!(edited.body, "new body");
        assert_eq!(edited.updated_at_ms, 101);
    }

    #[tokio::test]
    async fn test_delete_tombstones_and_hides() {
        let clock = Arc::new(ManualClock::new(100));
        let notes = service(&clock);
        let note = notes.create("t", "b").await.unwrap();
        clock.set(500);

        let deleted = notes.delete(&note.note_id).await.unwrap();
        assert_eq!(deleted.deleted_at_ms, Some(500));

        assert!(notes.get(&note.note_id).await.unwrap().is_none());
        assert!(notes.list(None).await.unwrap().is_empty());
        // The tombstone is still stored
        assert!(notes.store().get_note(&note.note_id).await.unwrap().is_some());

        let kinds: Vec<_> = notes
            .store()
            .queued_ops()
            .await
            .unwrap()
            .iter()
            .map(|op| op.kind)
            .collect();
        assert_eq!(kinds, vec![OpKind::Upsert, OpKind::Delete]);
    }

    #[tokio::test]
    async fn test_edit_missing_or_deleted_fails() {
        let clock = Arc::new(ManualClock::new(1));
        let notes = service(&clock);
        assert!(matches!(
            notes.update("nope", Some("x"), None).await,
            Err(NoteError::NotFound(_))
        ));

        let note = notes.create("t", "b").await.unwrap();
        notes.delete(&note.note_id).await.unwrap();
        assert!(matches!(
            notes.delete(&note.note_id).await,
            Err(NoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let clock = Arc::new(ManualClock::new(1));
        let notes = service(&clock);
        notes.create("Shopping", "Milk and eggs").await.unwrap();
        clock.set(2);
        notes.create("Work", "quarterly report").await.unwrap();
        clock.set(3);
        notes.create("Ideas", "buy more MILK").await.unwrap();

        let all = notes.list(None).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Ideas", "Work", "Shopping"]);

        let milk = notes.list(Some("milk")).await.unwrap();
        let titles: Vec<_> = milk.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Ideas", "Shopping"]);

        assert_eq!(notes.list(Some("  ")).await.unwrap().len(), 3);
    }
}
