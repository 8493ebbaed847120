//! Push pipeline: drains the outbox against the remote store.
//!
//! Each queued operation is re-evaluated against the note as it is *now*:
//! - note gone: the operation is moot and dropped
//! - note tombstoned: handled as a delete, whatever was queued
//! - otherwise: update the mapped (or recovered) remote file, or create one
//!
//! An operation leaves the outbox only after its remote effect is confirmed,
//! and a mapping is written only after a create/update succeeds. The first
//! unrecoverable error stops the drain; operations already removed stay removed.

use crate::engine::{Result, SyncEngine, SyncError};
use crate::events::SyncEvent;
use crate::mapping::{self, Located};
use crate::note::Note;
use crate::outbox::{self, OpKind, OutboxOp};
use crate::remote::{
    NOTE_CONTENT_TYPE, RemoteError, RemoteFileApi, UploadedFile, note_file_name, note_tags,
};
use crate::store::LocalStore;

use tracing::{debug, info, warn};

/// What happened to one outbox operation
enum Applied {
    Upserted(String),
    Deleted(Option<String>),
    Moot,
}

impl<S: LocalStore, R: RemoteFileApi> SyncEngine<S, R> {
    /// Drain the outbox in enqueue order.
    ///
    /// Returns the number of operations whose remote effect was applied.
    /// Moot operations are removed but not counted.
    pub async fn push_outbox(&self) -> Result<usize> {
        let ops = outbox::pending(&self.store).await?;
        if ops.is_empty() {
            return Ok(0);
        }
        debug!("Pushing {} queued operation(s)", ops.len());

        let mut applied = 0;
        for op in &ops {
            let outcome = self.apply_op(op).await?;
            outbox::complete(&self.store, op).await?;

            match outcome {
                Applied::Moot => {
                    warn!("Discarded {:?} for missing note {}", op.kind, op.note_id);
                    self.events.emit(SyncEvent::OperationDiscarded {
                        note_id: op.note_id.clone(),
                    });
                }
                Applied::Upserted(file_id) => {
                    applied += 1;
                    self.events.emit(SyncEvent::OperationPushed {
                        operation: "upsert".into(),
                        note_id: op.note_id.clone(),
                        file_id: Some(file_id),
                    });
                }
                Applied::Deleted(file_id) => {
                    applied += 1;
                    self.events.emit(SyncEvent::OperationPushed {
                        operation: "delete".into(),
                        note_id: op.note_id.clone(),
                        file_id,
                    });
                }
            }
        }

        info!("Pushed {} of {} queued operation(s)", applied, ops.len());
        Ok(applied)
    }

    async fn apply_op(&self, op: &OutboxOp) -> Result<Applied> {
        match op.kind {
            OpKind::Upsert => match self.store.get_note(&op.note_id).await? {
                None => Ok(Applied::Moot),
                Some(note) if note.is_deleted() => {
                    debug!("Note {} was deleted after its upsert was queued", note.note_id);
                    self.push_delete(&op.note_id).await.map(Applied::Deleted)
                }
                Some(note) => self.push_upsert(&note).await.map(Applied::Upserted),
            },
            OpKind::Delete => self.push_delete(&op.note_id).await.map(Applied::Deleted),
        }
    }

    /// Create or update the remote file for a live note and record the mapping.
    async fn push_upsert(&self, note: &Note) -> Result<String> {
        let body = note
            .to_remote_body()
            .map_err(|e| SyncError::Serialization(e.to_string()))?;

        let located = mapping::locate_remote_file(&self.store, &self.remote, &note.note_id).await?;
        let uploaded = match located {
            Located::Mapped(file_id) => match self.update_remote(&file_id, &body, note).await {
                Err(SyncError::Remote(RemoteError::NotFound(_))) => {
                    // Mapped file vanished remotely; fall back as if unmapped
                    debug!("Mapped file {} for note {} is gone", file_id, note.note_id);
                    match mapping::recover_file_id(&self.remote, &note.note_id).await? {
                        Located::Recovered(found) => {
                            self.update_remote(&found, &body, note).await?
                        }
                        _ => self.create_remote(&body, note).await?,
                    }
                }
                other => other?,
            },
            Located::Recovered(file_id) => self.update_remote(&file_id, &body, note).await?,
            Located::Missing => self.create_remote(&body, note).await?,
        };

        mapping::record(&self.store, &note.note_id, &uploaded.file_id, uploaded.checksum).await?;
        debug!("Upserted note {} as {}", note.note_id, uploaded.file_id);
        Ok(uploaded.file_id)
    }

    async fn update_remote(&self, file_id: &str, body: &str, note: &Note) -> Result<UploadedFile> {
        Ok(self
            .remote
            .update_file(file_id, NOTE_CONTENT_TYPE, body, &note_tags(&note.note_id))
            .await?)
    }

    async fn create_remote(&self, body: &str, note: &Note) -> Result<UploadedFile> {
        Ok(self
            .remote
            .create_file(
                &note_file_name(&note.note_id),
                NOTE_CONTENT_TYPE,
                body,
                &note_tags(&note.note_id),
            )
            .await?)
    }

    /// Delete the remote file for a note, if any, and drop its mapping.
    ///
    /// A remote "not found" counts as already deleted.
    async fn push_delete(&self, note_id: &str) -> Result<Option<String>> {
        let located = mapping::locate_remote_file(&self.store, &self.remote, note_id).await?;
        let file_id = located.file_id().map(str::to_string);

        if let Some(file_id) = &file_id {
            match self.remote.delete_file(file_id).await {
                Ok(()) => debug!("Deleted remote file {} for note {}", file_id, note_id),
                Err(e) if e.is_not_found() => {
                    debug!("Remote file {} for note {} already gone", file_id, note_id)
                }
                Err(e) => return Err(e.into()),
            }
        }

        mapping::forget(&self.store, note_id).await?;
        Ok(file_id)
    }
}
