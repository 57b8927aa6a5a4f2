//! In-memory SessionRepository implementation for tests and local runs.

use std::sync::RwLock;

use async_trait::async_trait;

use super::error::{RepositoryError, Result};
use super::traits::SessionRepository;
use super::types::{CommitBatch, StoredSession};

/// Keeps the session records in process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
    session: RwLock<Option<StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn record_count(&self) -> usize {
        self.session
            .read()
            .map(|session| session.as_ref().map_or(0, |s| s.records.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn commit(&self, batch: &CommitBatch) -> Result<()> {
        let mut session = self
            .session
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        session.get_or_insert_with(StoredSession::default).apply(batch);
        Ok(())
    }

    async fn load(&self) -> Result<Option<StoredSession>> {
        let session = self
            .session
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(session.clone())
    }
}
