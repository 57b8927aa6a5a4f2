//! Repository contract for persisting the authoritative session.

use async_trait::async_trait;

use super::error::Result;
use super::types::{CommitBatch, StoredSession};

/// Key-addressable store for one session's records.
///
/// `commit` is all-or-nothing: either every change in the batch becomes
/// visible to `load`, or none does.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist every change in `batch` as one unit.
    async fn commit(&self, batch: &CommitBatch) -> Result<()>;

    /// Load the persisted session, if any was ever committed.
    async fn load(&self) -> Result<Option<StoredSession>>;
}
