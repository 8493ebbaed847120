//! Event infrastructure for sync status reporting.
//!
//! Provides `SyncEvent` for progress monitoring and `EventBus` for subscriptions.
//! Callers that render sync status subscribe; the pipelines only emit.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events emitted while a sync runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// An outbox operation reached the remote store.
    #[serde(rename_all = "camelCase")]
    OperationPushed {
        /// "upsert" or "delete"
        operation: String,
        note_id: String,
        /// Remote file touched, if any (a delete may find nothing to remove)
        file_id: Option<String>,
    },
    /// An outbox operation was dropped because its note no longer exists.
    #[serde(rename_all = "camelCase")]
    OperationDiscarded { note_id: String },
    /// A remote version replaced (or created) a local note.
    #[serde(rename_all = "camelCase")]
    NotePulled { note_id: String, file_id: String },
    /// The persisted change-feed cursor moved (per page, and at the end of a pull).
    #[serde(rename_all = "camelCase")]
    CursorAdvanced { bootstrap: bool },
    /// A full push-then-pull finished.
    #[serde(rename_all = "camelCase")]
    SyncCompleted {
        pushed: usize,
        pulled: usize,
        /// Completion time, in milliseconds since Unix epoch
        timestamp: i64,
    },
}

/// Keeps a callback registered on an `EventBus` until dropped.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Fan-out of sync events to registered callbacks. Lives in an `Arc`.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every event emitted after this call.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // Skipped if an emit on this thread still holds the read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    pub fn emit(&self, event: SyncEvent) {
        // Callbacks run outside the lock
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn discarded(note_id: &str) -> SyncEvent {
        SyncEvent::OperationDiscarded {
            note_id: note_id.into(),
        }
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let _sub = bus.subscribe(move |event| seen_clone.lock().unwrap().push(event));
        bus.emit(discarded("a"));

        assert_eq!(*seen.lock().unwrap(), vec![discarded("a")]);
    }

    #[test]
    fn test_subscription_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        {
            let _sub = bus.subscribe(move |_| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            });
            bus.emit(discarded("a"));
        }

        bus.emit(discarded("b"));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_sync_event_serialization() {
        let event = SyncEvent::OperationPushed {
            operation: "upsert".into(),
            note_id: "a".into(),
            file_id: Some("file-1".into()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"operationPushed\""));
        assert!(json.contains("\"noteId\":\"a\""));
        assert!(json.contains("\"fileId\":\"file-1\""));
    }
}
