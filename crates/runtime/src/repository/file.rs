//! File-based SessionRepository implementation.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::traits::SessionRepository;
use super::types::{CommitBatch, Record, RecordChange, RecordKey, StoredSession};

const SESSION_FILE: &str = "session.json";
const JOURNAL_FILE: &str = "journal.json";
const STAGED_EXTENSION: &str = "tmp";

#[derive(Debug, Serialize, Deserialize)]
struct SessionHeader {
    revision: u64,
}

/// Stores one JSON file per record under a session directory.
///
/// # File Layout
///
/// - `journal.json` holds the most recent batch. Renaming it into place is
///   the commit point: once it exists the batch is durable.
/// - `map.json`, `turns.json`, `token-{id}.json`, `budget-{actor}.json` hold
///   the records as of `session.json`'s revision.
/// - `session.json` holds the revision the record files reflect.
///
/// After the commit point the journal is applied to the record files and
/// removed. A journal left behind by a failed apply is replayed by `load`
/// and re-applied before the next commit.
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn live_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn staged_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.{STAGED_EXTENSION}"))
    }

    /// Writes `bytes` to a staged file and renames it over `name`. The staged
    /// file never outlives a failed rename.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let staged = self.staged_path(name);
        if let Err(err) = fs::write(&staged, bytes) {
            self.discard(&staged);
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&staged, self.live_path(name)) {
            self.discard(&staged);
            return Err(err.into());
        }
        Ok(())
    }

    fn discard(&self, staged: &Path) {
        if staged.is_file()
            && let Err(err) = fs::remove_file(staged)
        {
            tracing::warn!("failed to discard staged {}: {}", staged.display(), err);
        }
    }

    fn read_journal(&self) -> Result<Option<CommitBatch>> {
        let path = self.live_path(JOURNAL_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(&path)?)?))
    }

    /// Brings the record files up to `batch`, then retires the journal.
    /// Every step is idempotent, so a partial apply can simply be repeated.
    fn apply_journal(&self, batch: &CommitBatch) -> Result<()> {
        for change in &batch.changes {
            match change {
                RecordChange::Put(record) => {
                    let bytes = serde_json::to_vec_pretty(record)?;
                    self.write_atomic(&record.key().file_name(), &bytes)?;
                }
                RecordChange::Delete(key) => {
                    let path = self.live_path(&key.file_name());
                    if path.is_file() {
                        fs::remove_file(&path)?;
                    }
                }
            }
        }
        let header = serde_json::to_vec(&SessionHeader {
            revision: batch.revision,
        })?;
        self.write_atomic(SESSION_FILE, &header)?;
        fs::remove_file(self.live_path(JOURNAL_FILE))?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for FileSessionStore {
    async fn commit(&self, batch: &CommitBatch) -> Result<()> {
        // An earlier batch that never reached the record files goes first;
        // until it does, nothing new is accepted.
        if let Some(pending) = self.read_journal()? {
            tracing::info!(revision = pending.revision, "re-applying journaled batch");
            self.apply_journal(&pending)?;
        }

        self.write_atomic(JOURNAL_FILE, &serde_json::to_vec(batch)?)?;

        if let Err(err) = self.apply_journal(batch) {
            tracing::warn!(
                revision = batch.revision,
                "batch is journaled but not yet applied: {}",
                err
            );
        }

        tracing::debug!(
            revision = batch.revision,
            changes = batch.len(),
            "committed batch to {}",
            self.base_dir.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<StoredSession>> {
        let header_path = self.live_path(SESSION_FILE);
        let header: Option<SessionHeader> = if header_path.is_file() {
            Some(serde_json::from_slice(&fs::read(&header_path)?)?)
        } else {
            None
        };
        let journal = self.read_journal()?;
        if header.is_none() && journal.is_none() {
            return Ok(None);
        }

        let mut session = StoredSession {
            revision: header.map_or(0, |header| header.revision),
            ..StoredSession::default()
        };
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(key) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(RecordKey::from_file_name)
            else {
                continue;
            };
            let record: Record = serde_json::from_slice(&fs::read(&path)?)?;
            session.records.insert(key, record);
        }

        if let Some(batch) = journal {
            tracing::info!(revision = batch.revision, "replaying journaled batch");
            session.apply(&batch);
        }

        tracing::debug!(
            revision = session.revision,
            records = session.records.len(),
            "loaded session from {}",
            self.base_dir.display()
        );
        Ok(Some(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{Cost, EntityId, MovementBudget, Position, Token, TokenId, TokenKind};

    fn token_batch(revision: u64, position: Position) -> CommitBatch {
        CommitBatch {
            revision,
            changes: vec![
                RecordChange::Put(Record::Token(Token::new(
                    TokenId(1),
                    TokenKind::Player,
                    position,
                ))),
                RecordChange::Put(Record::Budget {
                    actor: EntityId(1),
                    budget: MovementBudget::new(Cost::squares(6)),
                }),
            ],
        }
    }

    #[tokio::test]
    async fn empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_records_survive_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileSessionStore::new(dir.path()).unwrap();
            store.commit(&token_batch(1, Position::new(2, 3))).await.unwrap();
        }

        let reopened = FileSessionStore::new(dir.path()).unwrap();
        let stored = reopened.load().await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.records.len(), 2);
        match stored.records.get(&RecordKey::Token(TokenId(1))) {
            Some(Record::Token(token)) => assert_eq!(token.position, Position::new(2, 3)),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deletes_remove_files_and_no_staged_files_remain() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        store.commit(&token_batch(1, Position::ORIGIN)).await.unwrap();
        store
            .commit(&CommitBatch {
                revision: 2,
                changes: vec![RecordChange::Delete(RecordKey::Token(TokenId(1)))],
            })
            .await
            .unwrap();

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.revision, 2);
        assert!(!stored.records.contains_key(&RecordKey::Token(TokenId(1))));

        assert_eq!(staged_files(dir.path()), 0);
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    fn staged_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "tmp"))
            .count()
    }

    fn move_with_second_actor(revision: u64) -> CommitBatch {
        CommitBatch {
            revision,
            changes: vec![
                RecordChange::Put(Record::Token(Token::new(
                    TokenId(1),
                    TokenKind::Player,
                    Position::new(3, 0),
                ))),
                RecordChange::Put(Record::Budget {
                    actor: EntityId(2),
                    budget: MovementBudget::new(Cost::squares(4)),
                }),
            ],
        }
    }

    /// Makes every rename onto `name` fail.
    fn obstruct(dir: &Path, name: &str) {
        let obstacle = dir.join(name);
        fs::create_dir(&obstacle).unwrap();
        fs::write(obstacle.join("keep"), b"x").unwrap();
    }

    #[tokio::test]
    async fn failed_journal_write_keeps_previous_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        store.commit(&token_batch(1, Position::ORIGIN)).await.unwrap();

        obstruct(dir.path(), JOURNAL_FILE);
        assert!(store.commit(&move_with_second_actor(2)).await.is_err());

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        match stored.records.get(&RecordKey::Token(TokenId(1))) {
            Some(Record::Token(token)) => assert_eq!(token.position, Position::ORIGIN),
            other => panic!("unexpected record: {other:?}"),
        }
        assert!(!stored.records.contains_key(&RecordKey::Budget(EntityId(2))));
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn interrupted_apply_is_replayed_as_a_whole() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).unwrap();
        store.commit(&token_batch(1, Position::ORIGIN)).await.unwrap();

        // The token file lands, the budget file cannot.
        obstruct(dir.path(), "budget-2.json");
        store.commit(&move_with_second_actor(2)).await.unwrap();
        assert_eq!(staged_files(dir.path()), 0);

        let stored = FileSessionStore::new(dir.path())
            .unwrap()
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.revision, 2);
        match stored.records.get(&RecordKey::Token(TokenId(1))) {
            Some(Record::Token(token)) => assert_eq!(token.position, Position::new(3, 0)),
            other => panic!("unexpected record: {other:?}"),
        }
        assert!(stored.records.contains_key(&RecordKey::Budget(EntityId(2))));

        // Nothing new is accepted until the journaled batch is applied.
        let next = CommitBatch {
            revision: 3,
            changes: vec![RecordChange::Delete(RecordKey::Token(TokenId(1)))],
        };
        assert!(store.commit(&next).await.is_err());

        fs::remove_dir_all(dir.path().join("budget-2.json")).unwrap();
        store.commit(&next).await.unwrap();
        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.revision, 3);
        assert!(!stored.records.contains_key(&RecordKey::Token(TokenId(1))));
        assert!(stored.records.contains_key(&RecordKey::Budget(EntityId(2))));
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }
}
