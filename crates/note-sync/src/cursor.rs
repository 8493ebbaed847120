//! Sync cursor state kept in the local store's meta table.
//!
//! Absence of a cursor means the next pull must bootstrap from a full listing.

use crate::store::{LocalStore, Result};

/// Meta key holding the change-feed cursor token
pub const CURSOR_KEY: &str = "sync.changesCursor";
/// Meta key holding the epoch millis of the last completed sync
pub const LAST_SYNC_KEY: &str = "sync.lastSyncAtMs";

pub async fn load_cursor<S: LocalStore + ?Sized>(store: &S) -> Result<Option<String>> {
    Ok(store
        .get_meta(CURSOR_KEY)
        .await?
        .filter(|token| !token.is_empty()))
}

pub async fn store_cursor<S: LocalStore + ?Sized>(store: &S, token: &str) -> Result<()> {
    store.put_meta(CURSOR_KEY, token).await
}

pub async fn last_sync_ms<S: LocalStore + ?Sized>(store: &S) -> Result<Option<i64>> {
    Ok(store
        .get_meta(LAST_SYNC_KEY)
        .await?
        .and_then(|value| value.parse().ok()))
}

pub async fn record_last_sync<S: LocalStore + ?Sized>(store: &S, now_ms: i64) -> Result<()> {
    store.put_meta(LAST_SYNC_KEY, &now_ms.to_string()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_cursor_roundtrip_and_empty_means_absent() {
        let store = InMemoryStore::new();
        assert!(load_cursor(&store).await.unwrap().is_none());

        store_cursor(&store, "").await.unwrap();
        assert!(load_cursor(&store).await.unwrap().is_none());

        store_cursor(&store, "cursor-4").await.unwrap();
        assert_eq!(load_cursor(&store).await.unwrap().as_deref(), Some("cursor-4"));
    }

    #[tokio::test]
    async fn test_last_sync_ignores_garbage() {
        let store = InMemoryStore::new();
        store.put_meta(LAST_SYNC_KEY, "yesterday").await.unwrap();
        assert!(last_sync_ms(&store).await.unwrap().is_none());

        record_last_sync(&store, 42).await.unwrap();
        assert_eq!(last_sync_ms(&store).await.unwrap(), Some(42));
    }
}
