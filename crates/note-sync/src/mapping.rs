//! Remote mapping table: local note id to remote file id.
//!
//! The mapping is advisory. Creating a remote file and recording its mapping
//! are two separate commits, so a crash in between leaves a remote file with
//! no mapping. `locate_remote_file` compensates by querying the remote store
//! for the note-id tag before anyone concludes the file doesn't exist.

use crate::engine::Result;
use crate::remote::{NOTE_ID_TAG, RemoteFileApi};
use crate::store::LocalStore;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Where a note's remote file lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMapping {
    pub note_id: String,
    pub drive_file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl RemoteMapping {
    pub fn new(
        note_id: impl Into<String>,
        drive_file_id: impl Into<String>,
        checksum: Option<String>,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            drive_file_id: drive_file_id.into(),
            checksum,
        }
    }
}

/// How a remote file id was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// From the local mapping table
    Mapped(String),
    /// Recovered from the remote store by note-id tag; the table had no entry
    Recovered(String),
    /// No remote file exists for the note
    Missing,
}

impl Located {
    pub fn file_id(&self) -> Option<&str> {
        match self {
            Located::Mapped(id) | Located::Recovered(id) => Some(id),
            Located::Missing => None,
        }
    }
}

/// Resolve the remote file for a note: mapping table first, then recovery.
pub async fn locate_remote_file<S, R>(store: &S, remote: &R, note_id: &str) -> Result<Located>
where
    S: LocalStore + ?Sized,
    R: RemoteFileApi + ?Sized,
{
    if let Some(mapping) = store.get_mapping(note_id).await? {
        return Ok(Located::Mapped(mapping.drive_file_id));
    }
    recover_file_id(remote, note_id).await
}

/// Recovery path for a lost mapping: ask the remote store by note-id tag.
pub async fn recover_file_id<R>(remote: &R, note_id: &str) -> Result<Located>
where
    R: RemoteFileApi + ?Sized,
{
    let matches = remote.query_files_by_tag(NOTE_ID_TAG, note_id).await?;
    if matches.len() > 1 {
        warn!(
            "{} remote files carry note id {}; using {}",
            matches.len(),
            note_id,
            matches[0].file_id
        );
    }
    match matches.into_iter().next() {
        Some(found) => {
            debug!("Recovered remote file {} for note {}", found.file_id, note_id);
            Ok(Located::Recovered(found.file_id))
        }
        None => Ok(Located::Missing),
    }
}

/// Record (or replace) the mapping for a note
pub async fn record<S: LocalStore + ?Sized>(
    store: &S,
    note_id: &str,
    file_id: &str,
    checksum: Option<String>,
) -> Result<()> {
    store
        .put_mapping(&RemoteMapping::new(note_id, file_id, checksum))
        .await?;
    Ok(())
}

/// Drop the mapping for a note
pub async fn forget<S: LocalStore + ?Sized>(store: &S, note_id: &str) -> Result<()> {
    store.delete_mapping(note_id).await?;
    Ok(())
}
