//! RemoteFileApi trait for the per-user remote file store.
//!
//! The remote store only knows about individual JSON blobs with string tags
//! and an incremental change feed addressed by opaque cursor tokens.
//!
//! Implementations:
//! - `InMemoryRemote` - For testing, with call recording and fault injection
//! - `FolderRemote` (in note-sync-cli) - A shared directory acting as the store

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Tag key marking a file's kind
pub const TYPE_TAG: &str = "type";
/// Value of `TYPE_TAG` for note files
pub const NOTE_TYPE: &str = "note";
/// Tag key carrying the local note id of a note file
pub const NOTE_ID_TAG: &str = "noteId";
/// Content type of uploaded note bodies
pub const NOTE_CONTENT_TYPE: &str = "application/json";

/// Remote file name for a note
pub fn note_file_name(note_id: &str) -> String {
    format!("note-{}.json", note_id)
}

/// Tags attached to every uploaded note file
pub fn note_tags(note_id: &str) -> Tags {
    let mut tags = Tags::new();
    tags.insert(TYPE_TAG.to_string(), NOTE_TYPE.to_string());
    tags.insert(NOTE_ID_TAG.to_string(), note_id.to_string());
    tags
}

/// Whether a tag set marks a note file
pub fn is_note_file(tags: &Tags) -> bool {
    tags.get(TYPE_TAG).map(String::as_str) == Some(NOTE_TYPE)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network failure or server-side error; the call may succeed later
    #[error("Transient remote error: {0}")]
    Transient(String),

    /// Missing, expired, or invalid credential
    #[error("Remote authorization failed: {0}")]
    Auth(String),

    #[error("Remote file not found: {0}")]
    NotFound(String),

    /// The remote store refused the request (bad cursor, malformed request, ...)
    #[error("Remote rejected request: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// Whether retrying the same call later could succeed without caller action
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

pub type Tags = BTreeMap<String, String>;

/// Metadata of a remote file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub file_id: String,
    pub tags: Tags,
    pub checksum: Option<String>,
}

/// Result of a create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_id: String,
    pub checksum: Option<String>,
}

/// One page of a tag-filtered listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileListPage {
    pub files: Vec<FileDescriptor>,
    pub next_page_token: Option<String>,
}

/// File state attached to a non-removal change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub tags: Tags,
    pub trashed: bool,
}

/// One entry of the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub file_id: String,
    pub removed: bool,
    /// Present unless `removed`
    pub file: Option<ChangedFile>,
}

impl Change {
    /// Whether this entry reports the file as removed or trashed
    pub fn is_removal(&self) -> bool {
        self.removed || self.file.as_ref().is_none_or(|f| f.trashed)
    }

    /// Whether this entry refers to a note file
    pub fn is_note(&self) -> bool {
        self.file.as_ref().is_some_and(|f| is_note_file(&f.tags))
    }
}

/// One page of the change feed.
///
/// Exactly one of `continuation_token` (more pages follow) or
/// `new_cursor_token` (feed exhausted; resume from here next time) is
/// normally set, but callers must tolerate neither being present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangePage {
    pub changes: Vec<Change>,
    pub continuation_token: Option<String>,
    pub new_cursor_token: Option<String>,
}

/// Authenticated remote file store.
///
/// Each call may fail with `RemoteError::Transient` or `RemoteError::Auth`.
#[async_trait]
pub trait RemoteFileApi: Send + Sync {
    /// Create a file with metadata and a JSON body
    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile>;

    /// Replace the body and tags of an existing file
    async fn update_file(
        &self,
        file_id: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile>;

    /// Delete a file. Fails with `RemoteError::NotFound` if it doesn't exist.
    async fn delete_file(&self, file_id: &str) -> Result<()>;

    /// Download a file's raw body
    async fn download_file(&self, file_id: &str) -> Result<String>;

    /// Files (not trashed) whose tag `key` equals `value`
    async fn query_files_by_tag(&self, key: &str, value: &str) -> Result<Vec<FileDescriptor>>;

    /// One page of files whose tag `key` equals `value`
    async fn list_files_by_tag(
        &self,
        key: &str,
        value: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage>;

    /// A cursor token representing "now" in the change feed
    async fn get_change_cursor(&self) -> Result<String>;

    /// One page of changes after `cursor`
    async fn list_changes_since(&self, cursor: &str) -> Result<ChangePage>;
}

#[async_trait]
impl<T: RemoteFileApi + ?Sized> RemoteFileApi for std::sync::Arc<T> {
    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        (**self).create_file(name, content_type, body, tags).await
    }

    async fn update_file(
        &self,
        file_id: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        (**self).update_file(file_id, content_type, body, tags).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        (**self).delete_file(file_id).await
    }

    async fn download_file(&self, file_id: &str) -> Result<String> {
        (**self).download_file(file_id).await
    }

    async fn query_files_by_tag(&self, key: &str, value: &str) -> Result<Vec<FileDescriptor>> {
        (**self).query_files_by_tag(key, value).await
    }

    async fn list_files_by_tag(
        &self,
        key: &str,
        value: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage> {
        (**self).list_files_by_tag(key, value, page_token).await
    }

    async fn get_change_cursor(&self) -> Result<String> {
        (**self).get_change_cursor().await
    }

    async fn list_changes_since(&self, cursor: &str) -> Result<ChangePage> {
        (**self).list_changes_since(cursor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_tags() {
        let tags = note_tags("abc");
        assert!(is_note_file(&tags));
        assert_eq!(tags.get(NOTE_ID_TAG).map(String::as_str), Some("abc"));
        assert!(!is_note_file(&Tags::new()));
    }

    #[test]
    fn test_change_classification() {
        let removed = Change {
            file_id: "f".into(),
            removed: true,
            file: None,
        };
        assert!(removed.is_removal());
        assert!(!removed.is_note());

        let trashed = Change {
            file_id: "f".into(),
            removed: false,
            file: Some(ChangedFile {
                tags: note_tags("a"),
                trashed: true,
            }),
        };
        assert!(trashed.is_removal());

        let live = Change {
            file_id: "f".into(),
            removed: false,
            file: Some(ChangedFile {
                tags: note_tags("a"),
                trashed: false,
            }),
        };
        assert!(!live.is_removal());
        assert!(live.is_note());
    }

    #[test]
    fn test_error_classification() {
        assert!(RemoteError::NotFound("f".into()).is_not_found());
        assert!(RemoteError::Transient("503".into()).is_retryable());
        assert!(!RemoteError::Auth("expired".into()).is_retryable());
    }
}
