//! SyncEngine: Sequences the push and pull pipelines against one remote store.
//!
//! A sync invocation works as follows:
//!
//! 1. Push: drain the outbox, turning each queued operation into a remote
//!    create, update, or delete (see `push.rs`)
//! 2. Pull: bootstrap from a full listing when no cursor is stored, otherwise
//!    read the change feed from the cursor (see `pull.rs`)
//! 3. Record the completion time and report counts
//!
//! Invocations must not overlap; callers serialize them. Every step commits
//! durably before the next begins, so an aborted sync leaves state that the
//! next invocation resumes from.

use crate::clock::{Clock, SystemClock};
use crate::cursor;
use crate::events::{EventBus, SyncEvent};
use crate::outbox;
use crate::remote::{RemoteError, RemoteFileApi};
use crate::store::{LocalStore, StoreError};

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Whether the caller must re-authenticate before retrying
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Remote(RemoteError::Auth(_)))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Counts from one `sync_now`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outbox operations whose remote effect was applied
    pub pushed: usize,
    /// Local notes written from remote data
    pub pulled: usize,
}

/// Snapshot of durable sync state, for status displays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub pending_ops: usize,
    /// False until the first bootstrap pull completes
    pub has_cursor: bool,
    pub last_sync_ms: Option<i64>,
}

/// Drives synchronization between a local store and a remote file store.
pub struct SyncEngine<S: LocalStore, R: RemoteFileApi> {
    pub(crate) store: S,
    pub(crate) remote: R,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: Arc<EventBus>,
}

impl<S: LocalStore, R: RemoteFileApi> SyncEngine<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        Self {
            store,
            remote,
            clock: Arc::new(SystemClock),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Use a different time source (tests, replays)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Event bus for sync progress; subscribe via `Arc<EventBus>::subscribe`
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Push fully, then pull, then record the completion time.
    ///
    /// Failures from either phase propagate unchanged; nothing is retried here.
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let pushed = self.push_outbox().await?;
        let pulled = self.pull_changes().await?;

        let now = self.clock.now_ms();
        cursor::record_last_sync(&self.store, now).await?;

        info!("Sync complete: pushed {}, pulled {}", pushed, pulled);
        self.events.emit(SyncEvent::SyncCompleted {
            pushed,
            pulled,
            timestamp: now,
        });

        Ok(SyncReport { pushed, pulled })
    }

    pub async fn status(&self) -> Result<SyncStatus> {
        Ok(SyncStatus {
            pending_ops: outbox::pending(&self.store).await?.len(),
            has_cursor: cursor::load_cursor(&self.store).await?.is_some(),
            last_sync_ms: cursor::last_sync_ms(&self.store).await?,
        })
    }
}
