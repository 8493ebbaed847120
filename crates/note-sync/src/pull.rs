//! Pull pipeline: merges remote notes into the local store.
//!
//! Two states, keyed on whether a change-feed cursor is stored:
//!
//! - **Bootstrap** (no cursor): list every note file, merge each one, then
//!   store a fresh cursor. Re-running after a crash before the cursor write
//!   re-merges the same files; merge is keyed by note id so nothing duplicates.
//! - **Incremental** (cursor present): page through the change feed from the
//!   cursor, merging changed note files, and persist the resume point after
//!   each page.
//!
//! Remote removals and trashing are observed but not mirrored as local
//! tombstones. Bodies that don't parse as notes are skipped.

use crate::conflict::resolve;
use crate::cursor;
use crate::engine::{Result, SyncEngine};
use crate::events::SyncEvent;
use crate::mapping;
use crate::note::RemoteNote;
use crate::remote::{NOTE_TYPE, RemoteFileApi, TYPE_TAG};
use crate::store::LocalStore;

use tracing::{debug, info, warn};

impl<S: LocalStore, R: RemoteFileApi> SyncEngine<S, R> {
    /// Pull remote changes. Returns the number of local notes written.
    pub async fn pull_changes(&self) -> Result<usize> {
        match cursor::load_cursor(&self.store).await? {
            None => self.bootstrap_pull().await,
            Some(token) => self.incremental_pull(token).await,
        }
    }

    async fn bootstrap_pull(&self) -> Result<usize> {
        debug!("No change cursor stored; bootstrapping from full listing");
        let mut pulled = 0;
        let mut seen = 0;
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .remote
                .list_files_by_tag(TYPE_TAG, NOTE_TYPE, page_token.as_deref())
                .await?;
            for file in page.files {
                seen += 1;
                if self.pull_file(&file.file_id, file.checksum).await? {
                    pulled += 1;
                }
            }
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        let token = self.remote.get_change_cursor().await?;
        cursor::store_cursor(&self.store, &token).await?;
        self.events.emit(SyncEvent::CursorAdvanced { bootstrap: true });

        info!("Bootstrap pull: {} remote note(s), {} applied locally", seen, pulled);
        Ok(pulled)
    }

    async fn incremental_pull(&self, start: String) -> Result<usize> {
        let mut token = start;
        let mut pulled = 0;

        loop {
            let page = self.remote.list_changes_since(&token).await?;
            for change in &page.changes {
                if change.is_removal() {
                    // Remote deletions are not mirrored to local tombstones
                    debug!("Ignoring remote removal of {}", change.file_id);
                    continue;
                }
                if !change.is_note() {
                    continue;
                }
                if self.pull_file(&change.file_id, None).await? {
                    pulled += 1;
                }
            }

            match page.continuation_token {
                Some(next) => {
                    // Everything before `next` is merged; safe to resume from it
                    cursor::store_cursor(&self.store, &next).await?;
                    self.events.emit(SyncEvent::CursorAdvanced { bootstrap: false });
                    token = next;
                }
                None => {
                    let final_token = page.new_cursor_token.unwrap_or(token);
                    cursor::store_cursor(&self.store, &final_token).await?;
                    self.events.emit(SyncEvent::CursorAdvanced { bootstrap: false });
                    break;
                }
            }
        }

        info!("Incremental pull: {} note(s) applied locally", pulled);
        Ok(pulled)
    }

    /// Download one remote note file, merge it, and (re)establish its mapping.
    ///
    /// Returns whether the local note was written.
    async fn pull_file(&self, file_id: &str, checksum: Option<String>) -> Result<bool> {
        let raw = match self.remote.download_file(file_id).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                debug!("Remote file {} disappeared before download", file_id);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let remote_note = match RemoteNote::parse(&raw) {
            Ok(note) => note,
            Err(e) => {
                warn!("Skipping remote file {}: not a note record ({})", file_id, e);
                return Ok(false);
            }
        };
        let note_id = remote_note.note_id.clone();

        let local = self.store.get_note(&note_id).await?;
        let resolution = resolve(local.as_ref(), &remote_note);
        if resolution.remote_won() {
            self.store.put_note(&resolution.merged).await?;
            debug!("Applied remote version of note {} from {}", note_id, file_id);
            self.events.emit(SyncEvent::NotePulled {
                note_id: note_id.clone(),
                file_id: file_id.to_string(),
            });
        }

        // A feed entry carries no checksum; keep the stored one only while
        // the content it describes is still the local version
        let existing = self.store.get_mapping(&note_id).await?;
        let unchanged = !resolution.remote_won()
            && checksum.is_none()
            && existing.as_ref().is_some_and(|m| m.drive_file_id == file_id);
        if !unchanged {
            mapping::record(&self.store, &note_id, file_id, checksum).await?;
        }

        Ok(resolution.remote_won())
    }
}
