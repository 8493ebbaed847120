//! Mutation log (outbox) of pending note operations.
//!
//! Operations are triggers, not payloads: they carry only the note id, and the
//! push pipeline re-reads current note state when it drains them. An operation
//! is removed only after its remote effect is confirmed (or it is found moot),
//! so delivery to the remote store is at-least-once.

use crate::store::{LocalStore, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of pending operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Upsert,
    Delete,
}

/// A queued operation awaiting propagation to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxOp {
    pub op_id: String,
    #[serde(rename = "type")]
    pub kind: OpKind,
    pub note_id: String,
    pub queued_at_ms: i64,
}

impl OutboxOp {
    /// Create an operation with a fresh unique id.
    pub fn new(kind: OpKind, note_id: impl Into<String>, queued_at_ms: i64) -> Self {
        Self {
            op_id: Uuid::new_v4().to_string(),
            kind,
            note_id: note_id.into(),
            queued_at_ms,
        }
    }
}

/// Append an operation for `note_id` to the outbox.
pub async fn enqueue<S: LocalStore + ?Sized>(
    store: &S,
    kind: OpKind,
    note_id: &str,
    queued_at_ms: i64,
) -> Result<OutboxOp> {
    let op = OutboxOp::new(kind, note_id, queued_at_ms);
    store.enqueue_op(&op).await?;
    Ok(op)
}

/// All queued operations in drain order.
///
/// Sorted by `queued_at_ms`; the sort is stable, so operations queued in the
/// same millisecond keep the order the store returned them in.
pub async fn pending<S: LocalStore + ?Sized>(store: &S) -> Result<Vec<OutboxOp>> {
    let mut ops = store.queued_ops().await?;
    ops.sort_by_key(|op| op.queued_at_ms);
    Ok(ops)
}

/// Remove an operation once it has been applied or found moot.
pub async fn complete<S: LocalStore + ?Sized>(store: &S, op: &OutboxOp) -> Result<()> {
    store.remove_op(&op.op_id).await
}
