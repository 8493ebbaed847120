//! In-memory model of the remote file store.
//!
//! `RemoteState` is the whole store (files plus an append-only change log) as
//! one serializable value, so it can back both `InMemoryRemote` and durable
//! single-document remotes. Cursor tokens are positions in the change log.

use crate::remote::{
    Change, ChangePage, ChangedFile, FileDescriptor, FileListPage, RemoteError, RemoteFileApi,
    Result, Tags, UploadedFile,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError, RwLock};

const DEFAULT_PAGE_SIZE: usize = 100;
const CURSOR_PREFIX: &str = "cursor-";
const PAGE_PREFIX: &str = "page-";

/// A file held by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub name: String,
    pub content_type: String,
    pub body: String,
    pub tags: Tags,
    pub checksum: String,
    #[serde(default)]
    pub trashed: bool,
}

/// An entry of the change log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub file_id: String,
    pub removed: bool,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub trashed: bool,
}

/// Complete remote store state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteState {
    #[serde(default)]
    pub files: BTreeMap<String, StoredFile>,
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    #[serde(default)]
    pub next_file_seq: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            changes: Vec::new(),
            next_file_seq: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn checksum(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

fn parse_token(token: &str, prefix: &str) -> Result<usize> {
    token
        .strip_prefix(prefix)
        .and_then(|rest| rest.parse().ok())
        .ok_or_else(|| RemoteError::Rejected(format!("invalid token: {}", token)))
}

impl RemoteState {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    fn record_change(&mut self, file_id: &str) {
        let record = match self.files.get(file_id) {
            Some(file) => ChangeRecord {
                file_id: file_id.to_string(),
                removed: false,
                tags: file.tags.clone(),
                trashed: file.trashed,
            },
            None => ChangeRecord {
                file_id: file_id.to_string(),
                removed: true,
                tags: Tags::new(),
                trashed: false,
            },
        };
        self.changes.push(record);
    }

    pub fn create(
        &mut self,
        name: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        self.next_file_seq += 1;
        let file_id = format!("file-{:06}", self.next_file_seq);
        let sum = checksum(body);
        self.files.insert(
            file_id.clone(),
            StoredFile {
                name: name.to_string(),
                content_type: content_type.to_string(),
                body: body.to_string(),
                tags: tags.clone(),
                checksum: sum.clone(),
                trashed: false,
            },
        );
        self.record_change(&file_id);
        Ok(UploadedFile {
            file_id,
            checksum: Some(sum),
        })
    }

    pub fn update(
        &mut self,
        file_id: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| RemoteError::NotFound(file_id.to_string()))?;
        let sum = checksum(body);
        file.content_type = content_type.to_string();
        file.body = body.to_string();
        file.checksum = sum.clone();
        for (key, value) in tags {
            file.tags.insert(key.clone(), value.clone());
        }
        self.record_change(file_id);
        Ok(UploadedFile {
            file_id: file_id.to_string(),
            checksum: Some(sum),
        })
    }

    pub fn delete(&mut self, file_id: &str) -> Result<()> {
        if self.files.remove(file_id).is_none() {
            return Err(RemoteError::NotFound(file_id.to_string()));
        }
        self.record_change(file_id);
        Ok(())
    }

    /// Move a file to the trash, as another client might
    pub fn trash(&mut self, file_id: &str) -> Result<()> {
        let file = self
            .files
            .get_mut(file_id)
            .ok_or_else(|| RemoteError::NotFound(file_id.to_string()))?;
        file.trashed = true;
        self.record_change(file_id);
        Ok(())
    }

    pub fn download(&self, file_id: &str) -> Result<String> {
        self.files
            .get(file_id)
            .map(|file| file.body.clone())
            .ok_or_else(|| RemoteError::NotFound(file_id.to_string()))
    }

    /// Files (not trashed) whose tag `key` equals `value`
    pub fn query(&self, key: &str, value: &str) -> Vec<FileDescriptor> {
        self.files
            .iter()
            .filter(|(_, file)| !file.trashed)
            .filter(|(_, file)| file.tags.get(key).map(String::as_str) == Some(value))
            .map(|(file_id, file)| FileDescriptor {
                file_id: file_id.clone(),
                tags: file.tags.clone(),
                checksum: Some(file.checksum.clone()),
            })
            .collect()
    }

    pub fn list_page(
        &self,
        key: &str,
        value: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage> {
        let offset = match page_token {
            Some(token) => parse_token(token, PAGE_PREFIX)?,
            None => 0,
        };
        let all = self.query(key, value);
        let end = (offset + self.page_size).min(all.len());
        let files = all.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_page_token = (end < all.len()).then(|| format!("{}{}", PAGE_PREFIX, end));
        Ok(FileListPage {
            files,
            next_page_token,
        })
    }

    pub fn cursor(&self) -> String {
        format!("{}{}", CURSOR_PREFIX, self.changes.len())
    }

    pub fn changes_since(&self, cursor: &str) -> Result<ChangePage> {
        let start = parse_token(cursor, CURSOR_PREFIX)?;
        if start > self.changes.len() {
            return Err(RemoteError::Rejected(format!("cursor from the future: {}", cursor)));
        }
        let end = (start + self.page_size).min(self.changes.len());
        let changes = self.changes[start..end]
            .iter()
            .map(|record| Change {
                file_id: record.file_id.clone(),
                removed: record.removed,
                file: (!record.removed).then(|| ChangedFile {
                    tags: record.tags.clone(),
                    trashed: record.trashed,
                }),
            })
            .collect();

        if end < self.changes.len() {
            Ok(ChangePage {
                changes,
                continuation_token: Some(format!("{}{}", CURSOR_PREFIX, end)),
                new_cursor_token: None,
            })
        } else {
            Ok(ChangePage {
                changes,
                continuation_token: None,
                new_cursor_token: Some(self.cursor()),
            })
        }
    }
}

/// Kind of a remote call, for fault injection and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Create,
    Update,
    Delete,
    Download,
    QueryByTag,
    ListByTag,
    GetChangeCursor,
    ListChanges,
}

/// A recorded remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Create { name: String },
    Update { file_id: String },
    Delete { file_id: String },
    Download { file_id: String },
    QueryByTag { key: String, value: String },
    ListByTag { page_token: Option<String> },
    GetChangeCursor,
    ListChanges { cursor: String },
}

impl RemoteCall {
    pub fn kind(&self) -> CallKind {
        match self {
            RemoteCall::Create { .. } => CallKind::Create,
            RemoteCall::Update { .. } => CallKind::Update,
            RemoteCall::Delete { .. } => CallKind::Delete,
            RemoteCall::Download { .. } => CallKind::Download,
            RemoteCall::QueryByTag { .. } => CallKind::QueryByTag,
            RemoteCall::ListByTag { .. } => CallKind::ListByTag,
            RemoteCall::GetChangeCursor => CallKind::GetChangeCursor,
            RemoteCall::ListChanges { .. } => CallKind::ListChanges,
        }
    }
}

/// In-memory remote store for testing.
///
/// Records every call and can be told to fail the next call of a given kind.
/// A failed call is recorded but has no effect on the state.
#[derive(Default)]
pub struct InMemoryRemote {
    state: RwLock<RemoteState>,
    calls: Mutex<Vec<RemoteCall>>,
    /// Pending faults: calls of this kind still to let through, then the error
    failures: Mutex<HashMap<CallKind, (usize, RemoteError)>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: RwLock::new(RemoteState::with_page_size(page_size)),
            ..Self::default()
        }
    }

    /// Fail the next call of `kind` with `error`
    pub fn fail_next(&self, kind: CallKind, error: RemoteError) {
        self.fail_nth(kind, 1, error);
    }

    /// Fail the `n`th upcoming call of `kind` (1-based) with `error`
    pub fn fail_nth(&self, kind: CallKind, n: usize, error: RemoteError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, (n.saturating_sub(1), error));
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|call| call.kind() == kind).count()
    }

    /// Forget recorded calls (state is untouched)
    pub fn clear_calls(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Direct access to the state, bypassing call recording and fault injection
    pub fn with_state<R>(&self, f: impl FnOnce(&mut RemoteState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Number of live (not trashed) files
    pub fn file_count(&self) -> usize {
        self.with_state(|state| state.files.values().filter(|f| !f.trashed).count())
    }

    fn begin(&self, call: RemoteCall) -> Result<()> {
        let kind = call.kind();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        match failures.get_mut(&kind) {
            Some((0, _)) => match failures.remove(&kind) {
                Some((_, error)) => Err(error),
                None => Ok(()),
            },
            Some((skip, _)) => {
                *skip -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteFileApi for InMemoryRemote {
    async fn create_file(
        &self,
        name: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        self.begin(RemoteCall::Create {
            name: name.to_string(),
        })?;
        self.with_state(|state| state.create(name, content_type, body, tags))
    }

    async fn update_file(
        &self,
        file_id: &str,
        content_type: &str,
        body: &str,
        tags: &Tags,
    ) -> Result<UploadedFile> {
        self.begin(RemoteCall::Update {
            file_id: file_id.to_string(),
        })?;
        self.with_state(|state| state.update(file_id, content_type, body, tags))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.begin(RemoteCall::Delete {
            file_id: file_id.to_string(),
        })?;
        self.with_state(|state| state.delete(file_id))
    }

    async fn download_file(&self, file_id: &str) -> Result<String> {
        self.begin(RemoteCall::Download {
            file_id: file_id.to_string(),
        })?;
        self.with_state(|state| state.download(file_id))
    }

    async fn query_files_by_tag(&self, key: &str, value: &str) -> Result<Vec<FileDescriptor>> {
        self.begin(RemoteCall::QueryByTag {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(self.with_state(|state| state.query(key, value)))
    }

    async fn list_files_by_tag(
        &self,
        key: &str,
        value: &str,
        page_token: Option<&str>,
    ) -> Result<FileListPage> {
        self.begin(RemoteCall::ListByTag {
            page_token: page_token.map(str::to_string),
        })?;
        self.with_state(|state| state.list_page(key, value, page_token))
    }

    async fn get_change_cursor(&self) -> Result<String> {
        self.begin(RemoteCall::GetChangeCursor)?;
        Ok(self.with_state(|state| state.cursor()))
    }

    async fn list_changes_since(&self, cursor: &str) -> Result<ChangePage> {
        self.begin(RemoteCall::ListChanges {
            cursor: cursor.to_string(),
        })?;
        self.with_state(|state| state.changes_since(cursor))
    }
}
