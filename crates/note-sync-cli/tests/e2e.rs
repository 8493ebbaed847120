//! End-to-end tests for the on-disk client.
//!
//! Two data directories play two devices syncing through one shared folder.

use note_sync::LocalStore;
use note_sync::cursor;
use note_sync_cli::{Client, JsonStore};
use std::path::PathBuf;
use tempfile::TempDir;

struct Setup {
    _root: TempDir,
    remote_dir: PathBuf,
    laptop_dir: PathBuf,
    phone_dir: PathBuf,
}

impl Setup {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        Self {
            remote_dir: root.path().join("remote"),
            laptop_dir: root.path().join("laptop"),
            phone_dir: root.path().join("phone"),
            _root: root,
        }
    }

    fn laptop(&self) -> Client {
        Client::open(&self.laptop_dir, &self.remote_dir, 2)
    }

    fn phone(&self) -> Client {
        Client::open(&self.phone_dir, &self.remote_dir, 2)
    }
}

#[tokio::test]
async fn test_note_travels_between_devices() {
    let setup = Setup::new();
    let laptop = setup.laptop();
    let phone = setup.phone();

    let note = laptop.notes.create("Groceries", "milk").await.unwrap();
    let report = laptop.engine.sync_now().await.unwrap();
    assert_eq!(report.pushed, 1);

    let report = phone.engine.sync_now().await.unwrap();
    assert_eq!(report.pulled, 1);
    let on_phone = phone.notes.get(&note.note_id).await.unwrap().unwrap();
    assert_eq!(on_phone, note);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let setup = Setup::new();
    let note_id = {
        let laptop = setup.laptop();
        let note = laptop.notes.create("Draft", "").await.unwrap();
        laptop.engine.sync_now().await.unwrap();
        note.note_id
    };

    // A new process over the same directories has nothing left to do
    let laptop = setup.laptop();
    let status = laptop.engine.status().await.unwrap();
    assert_eq!(status.pending_ops, 0);
    assert!(status.has_cursor);

    let report = laptop.engine.sync_now().await.unwrap();
    assert_eq!((report.pushed, report.pulled), (0, 0));
    assert!(laptop.notes.get(&note_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_offline_edits_queue_until_sync() {
    let setup = Setup::new();
    let laptop = setup.laptop();

    let note = laptop.notes.create("t", "one").await.unwrap();
    laptop
        .notes
        .update(&note.note_id, None, Some("two"))
        .await
        .unwrap();
    assert_eq!(laptop.engine.status().await.unwrap().pending_ops, 2);
    assert!(!setup.remote_dir.join("remote.json").exists());

    let report = laptop.engine.sync_now().await.unwrap();
    assert_eq!(report.pushed, 2);

    let phone = setup.phone();
    phone.engine.sync_now().await.unwrap();
    let on_phone = phone.notes.get(&note.note_id).await.unwrap().unwrap();
    assert_eq!(on_phone.body, "two");
}

#[tokio::test]
async fn test_later_edit_wins_across_devices() {
    let setup = Setup::new();
    let laptop = setup.laptop();
    let phone = setup.phone();

    let note = laptop.notes.create("Plan", "v1").await.unwrap();
    laptop.engine.sync_now().await.unwrap();
    phone.engine.sync_now().await.unwrap();

    // Write a strictly newer edit directly so the outcome doesn't hinge on wall-clock resolution
    let mut newer = phone.notes.get(&note.note_id).await.unwrap().unwrap();
    newer.body = "from phone".into();
    newer.updated_at_ms = note.updated_at_ms + 60_000;
    let phone_store = JsonStore::in_dir(&setup.phone_dir);
    phone_store.put_note(&newer).await.unwrap();
    note_sync::outbox::enqueue(
        &phone_store,
        note_sync::OpKind::Upsert,
        &newer.note_id,
        newer.updated_at_ms,
    )
    .await
    .unwrap();

    phone.engine.sync_now().await.unwrap();
    let report = laptop.engine.sync_now().await.unwrap();
    assert_eq!(report.pulled, 1);

    let on_laptop = laptop.notes.get(&note.note_id).await.unwrap().unwrap();
    assert_eq!(on_laptop.body, "from phone");
    assert_eq!(on_laptop.updated_at_ms, newer.updated_at_ms);
}

#[tokio::test]
async fn test_many_notes_bootstrap_across_pages() {
    let setup = Setup::new();
    let laptop = setup.laptop();
    for i in 0..5 {
        laptop.notes.create(&format!("note {}", i), "").await.unwrap();
    }
    laptop.engine.sync_now().await.unwrap();

    let phone = setup.phone();
    let report = phone.engine.sync_now().await.unwrap();
    assert_eq!(report.pulled, 5);
    assert_eq!(phone.notes.list(None).await.unwrap().len(), 5);

    let phone_store = JsonStore::in_dir(&setup.phone_dir);
    assert!(cursor::load_cursor(&phone_store).await.unwrap().is_some());
    assert_eq!(phone_store.list_notes().await.unwrap().len(), 5);
}
