//! note-sync-cli: On-disk collaborators for the `notes` command-line client.
//!
//! Re-exports modules for integration testing.

pub mod config;
pub mod folder_remote;
pub mod json_file;
pub mod json_store;

pub use config::Config;
pub use folder_remote::FolderRemote;
pub use json_store::JsonStore;

use note_sync::{NoteService, SyncEngine};
use std::path::Path;
use std::sync::Arc;

/// A client wired to one data directory and one remote folder.
pub struct Client {
    pub notes: NoteService<Arc<JsonStore>>,
    pub engine: SyncEngine<Arc<JsonStore>, FolderRemote>,
}

impl Client {
    pub fn open(data_dir: &Path, remote_dir: &Path, page_size: usize) -> Self {
        let store = Arc::new(JsonStore::in_dir(data_dir));
        let remote = FolderRemote::new(remote_dir).with_page_size(page_size);
        Self {
            notes: NoteService::new(Arc::clone(&store)),
            engine: SyncEngine::new(store, remote),
        }
    }
}
