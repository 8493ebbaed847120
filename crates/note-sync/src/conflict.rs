//! Last-write-wins conflict resolution between a local note and a remote one.
//!
//! Remote wins only when its `updated_at_ms` is strictly greater. Equal
//! timestamps keep the local note without a write, which makes re-pulling the
//! same change a no-op.

use crate::note::{Note, RemoteNote};

/// Which side a resolution picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub winner: Winner,
    /// The record to keep. Callers write it only when `winner` is `Remote`.
    pub merged: Note,
}

impl Resolution {
    pub fn remote_won(&self) -> bool {
        self.winner == Winner::Remote
    }
}

pub fn resolve(local: Option<&Note>, remote: &RemoteNote) -> Resolution {
    match local {
        None => Resolution {
            winner: Winner::Remote,
            merged: remote.clone().into_note(),
        },
        Some(local) if remote.updated_at_ms > local.updated_at_ms => Resolution {
            winner: Winner::Remote,
            merged: local.overlay(remote),
        },
        Some(local) => Resolution {
            winner: Winner::Local,
            merged: local.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(note_id: &str, updated_at_ms: i64, title: &str) -> RemoteNote {
        RemoteNote::from(&Note::new(note_id, title, "remote body", updated_at_ms))
    }

    #[test]
    fn test_no_local_remote_wins() {
        let resolution = resolve(None, &remote("b", 200, "r"));
        assert_eq!(resolution.winner, Winner::Remote);
        assert_eq!(resolution.merged, Note::new("b", "r", "remote body", 200));
    }

    #[test]
    fn test_newer_remote_wins() {
        let local = Note::new("a", "l", "local body", 100);
        let resolution = resolve(Some(&local), &remote("a", 150, "r"));
        assert!(resolution.remote_won());
        assert_eq!(resolution.merged.title, "r");
        assert_eq!(resolution.merged.updated_at_ms, 150);
    }

    #[test]
    fn test_older_remote_loses() {
        let local = Note::new("c", "l", "local body", 300);
        let resolution = resolve(Some(&local), &remote("c", 250, "r"));
        assert_eq!(resolution.winner, Winner::Local);
        assert_eq!(resolution.merged, local);
    }

    #[test]
    fn test_tie_keeps_local() {
        let local = Note::new("a", "l", "local body", 100);
        let resolution = resolve(Some(&local), &remote("a", 100, "r"));
        assert_eq!(resolution.winner, Winner::Local);
        assert_eq!(resolution.merged, local);
    }

    #[test]
    fn test_merged_timestamp_is_max_except_tie() {
        for (l, r) in [(1, 2), (2, 1), (5, 5), (0, 1_000), (1_000, 0)] {
            let local = Note::new("x", "l", "b", l);
            let resolution = resolve(Some(&local), &remote("x", r, "r"));
            assert_eq!(resolution.merged.updated_at_ms, l.max(r));
            if l == r {
                assert_eq!(resolution.winner, Winner::Local);
            }
        }
    }

    #[test]
    fn test_remote_cannot_erase_absent_fields() {
        let local = Note::new("a", "keep me", "and me", 100);
        let sparse = RemoteNote {
            note_id: "a".into(),
            updated_at_ms: 101,
            title: None,
            body: None,
            deleted_at_ms: None,
        };
        let resolution = resolve(Some(&local), &sparse);
        assert!(resolution.remote_won());
        assert_eq!(resolution.merged.title, "keep me");
        assert_eq!(resolution.merged.body, "and me");
    }
}
