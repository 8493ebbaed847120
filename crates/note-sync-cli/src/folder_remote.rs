//! Directory-backed remote file store.
//!
//! Persists a `RemoteState` document (files plus change log) in a shared
//! folder, so several data directories can sync through it as separate
//! devices. Calls within one process are serialized; concurrent `notes`
//! processes against the same folder are not supported.

use crate::json_file::{self, JsonFileError};

use async_trait::async_trait;
use note_sync::RemoteState;
use note_sync::remote::{
    ChangePage, FileDescriptor, FileListPage, RemoteError, RemoteFileApi, Result, Tags,
    UploadedFile,
};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// File name of the remote document within the shared folder
pub const REMOTE_FILE: &str = "remote.json";

const DEFAULT_PAGE_SIZE: usize = 100;

fn remote_error(e: JsonFileError) -> RemoteError {
    match e {
        JsonFileError::Io { .. } => RemoteError::Transient(e.to_string()),
        JsonFileError::Json { .. } => RemoteError::Rejected(e.to_string()),
    }
}

pub struct FolderRemote {
    path: PathBuf,
    page_size: usize,
    lock: Mutex<()>,
}

impl FolderRemote {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(REMOTE_FILE),
            page_size: DEFAULT_PAGE_SIZE,
            lock: Mutex::new(()),
        }
    }

    /// Page size for listings and the change feed
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<RemoteState> {
        let mut state: RemoteState = json_file::load_or_default(&self.path)
            .await
            .map_err(remote_error)?;
        state.page_size = self.page_size;
        Ok(state)
    }

    async fn read<T>(&self, f: impl FnOnce(&RemoteState) -> Result<T> + Send) -> Result<T> {
        let _guard = self.lock.lock().await;
        let state = self.load().await?;
        f(&state)
    }

    /// Apply `f` and save, unless `f` fails
    async fn modify<T>(&self, f: impl FnOnce(&mut RemoteState) -> Result<T> + Send) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let value = f(&mut state)?;
        json_file::save_atomic(&self.path, &state)
            .await
            .map_err(remote_error)?;
        Ok(value)
    }
}

#[async_trait]
impl RemoteFileApi for FolderRemote {
    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        let uploaded = self
            .modify(|state| state.create(name, content_type, body, tags))
            .await?;
        debug!("Created {} as {}", name, uploaded.file_id);
        Ok(uploaded)
    }

    async fn update_file(
        &self,
        file_id: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        self.modify(|state| state.update(file_id, content_type, body, tags))
            .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.modify(|state| state.delete(file_id)).await
    }

    async fn download_file(&self, file_id: &str) -> Result<String> {
        self.read(|state| state.download(file_id)).await
    }

    async fn query_files_by_tag(&self, key: &str, value: &str) -> Result<Vec<FileDescriptor>> {
        self.read(|state| Ok(state.query(key, value))).await
    }

    async fn list_files_by_tag(
        &self,
        key: &str,
        value: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage> {
        self.read(|state| state.list_page(key, value, page_token))
            .await
    }

    async fn get_change_cursor(&self) -> Result<String> {
        self.read(|state| Ok(state.cursor())).await
    }

    async fn list_changes_since(&self, cursor: &str) -> Result<ChangePage> {
        self.read(|state| state.changes_since(cursor)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_sync::remote::{NOTE_ID_TAG, NOTE_TYPE, TYPE_TAG, note_tags};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_files_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let tags = note_tags("a");
        let created = FolderRemote::new(dir.path())
            .create_file("note-a.json", "application/json", "{}", &tags)
            .await
            .unwrap();

        let other = FolderRemote::new(dir.path());
        assert_eq!(other.download_file(&created.file_id).await.unwrap(), "{}");
        let found = other.query_files_by_tag(NOTE_ID_TAG, "a").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_id, created.file_id);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let remote = FolderRemote::new(dir.path());
        let start = remote.get_change_cursor().await.unwrap();

        let result = remote
            .update_file("file-missing", "application/json", "{}", &note_tags("x"))
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));

        let page = remote.list_changes_since(&start).await.unwrap();
        assert!(page.changes.is_empty());
        assert!(!remote.path().exists());
    }

    #[tokio::test]
    async fn test_configured_page_size_applies() {
        let dir = TempDir::new().unwrap();
        let remote = FolderRemote::new(dir.path()).with_page_size(1);
        for id in ["a", "b"] {
            remote
                .create_file(&format!("note-{}.json", id), "application/json", "{}", &note_tags(id))
                .await
                .unwrap();
        }

        let first = remote
            .list_files_by_tag(TYPE_TAG, NOTE_TYPE, None)
            .await
            .unwrap();
        assert_eq!(first.files.len(), 1);
        let next = first.next_page_token.unwrap();
        let second = remote
            .list_files_by_tag(TYPE_TAG, NOTE_TYPE, Some(&next))
            .await
            .unwrap();
        assert_eq!(second.files.len(), 1);
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_folder_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(REMOTE_FILE), "garbage").unwrap();
        let remote = FolderRemote::new(dir.path());

        assert!(matches!(
            remote.get_change_cursor().await,
            Err(RemoteError::Rejected(_))
        ));
    }
}
