//! Note records as stored locally and as serialized into remote file bodies.
//!
//! Local notes are complete records. Remote bodies are decoded leniently into
//! `RemoteNote`, where everything except identity and timestamp may be absent,
//! so a merge can overlay only the fields the remote actually carried.

use serde::{Deserialize, Serialize};

/// A single note owned by the local store.
///
/// A note with `deleted_at_ms` set is a tombstone: still stored so the
/// deletion can propagate, but excluded from listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub note_id: String,
    pub title: String,
    pub body: String,
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_ms: Option<i64>,
}

impl Note {
    pub fn new(
        note_id: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        updated_at_ms: i64,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            title: title.into(),
            body: body.into(),
            updated_at_ms,
            deleted_at_ms: None,
        }
    }

    /// Whether this note is a tombstone
    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    /// Serialize to the JSON body uploaded to the remote store.
    pub fn to_remote_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Overlay the fields present in a remote record onto this note.
    pub fn overlay(&self, remote: &RemoteNote) -> Note {
        Note {
            note_id: self.note_id.clone(),
            title: remote.title.clone().unwrap_or_else(|| self.title.clone()),
            body: remote.body.clone().unwrap_or_else(|| self.body.clone()),
            updated_at_ms: remote.updated_at_ms,
            deleted_at_ms: remote.deleted_at_ms.or(self.deleted_at_ms),
        }
    }
}

/// A note as decoded from a downloaded remote body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    pub note_id: String,
    pub updated_at_ms: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub deleted_at_ms: Option<i64>,
}

impl RemoteNote {
    /// Parse a raw remote body. Fails on anything that isn't a note record.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Materialize as a complete local note, defaulting absent text fields.
    pub fn into_note(self) -> Note {
        Note {
            note_id: self.note_id,
            title: self.title.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            updated_at_ms: self.updated_at_ms,
            deleted_at_ms: self.deleted_at_ms,
        }
    }
}

impl From<&Note> for RemoteNote {
    fn from(note: &Note) -> Self {
        Self {
            note_id: note.note_id.clone(),
            updated_at_ms: note.updated_at_ms,
            title: Some(note.title.clone()),
            body: Some(note.body.clone()),
            deleted_at_ms: note.deleted_at_ms,
        }
    }
}
