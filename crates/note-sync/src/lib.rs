//! note-sync: Offline-first synchronization of notes against a remote file store.
//!
//! This crate provides the core functionality for:
//! - An outbox of pending local mutations, drained by the push pipeline
//! - A local-id to remote-file mapping table with tag-query recovery
//! - Bootstrap and incremental pulls over an opaque change-feed cursor
//! - Last-write-wins conflict resolution by modification timestamp
//! - `LocalStore` and `RemoteFileApi` trait abstractions for the collaborators

pub mod clock;
pub mod conflict;
pub mod cursor;
pub mod engine;
pub mod events;
pub mod mapping;
pub mod memory_remote;
pub mod note;
pub mod notes;
pub mod outbox;
pub mod pull;
pub mod push;
pub mod remote;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conflict::{Resolution, Winner, resolve};
pub use engine::{SyncEngine, SyncError, SyncReport, SyncStatus};
pub use events::{EventBus, Subscription, SyncEvent};
pub use mapping::RemoteMapping;
pub use memory_remote::{CallKind, InMemoryRemote, RemoteCall, RemoteState};
pub use note::{Note, RemoteNote};
pub use notes::{NoteError, NoteService};
pub use outbox::{OpKind, OutboxOp};
pub use remote::{RemoteError, RemoteFileApi};
pub use store::{InMemoryStore, LocalStore, StoreError};
