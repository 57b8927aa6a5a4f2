//! Record types exchanged with session repositories.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use tabletop_core::{
    EntityId, Encounter, GameConfig, GridMap, MapDimensions, MovementBudget, MovementLedger,
    TerrainCell, Token, TokenId, TurnTracker,
};

use super::error::{RepositoryError, Result};

/// Address of one persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKey {
    Map,
    Token(TokenId),
    Budget(EntityId),
    Turns,
}

impl RecordKey {
    /// File name used by the file-backed store.
    pub fn file_name(&self) -> String {
        match self {
            RecordKey::Map => "map.json".to_string(),
            RecordKey::Token(id) => format!("token-{}.json", id.0),
            RecordKey::Budget(actor) => format!("budget-{}.json", actor.0),
            RecordKey::Turns => "turns.json".to_string(),
        }
    }

    /// Inverse of [`RecordKey::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        match stem {
            "map" => Some(RecordKey::Map),
            "turns" => Some(RecordKey::Turns),
            _ => {
                if let Some(id) = stem.strip_prefix("token-") {
                    id.parse().ok().map(|id| RecordKey::Token(TokenId(id)))
                } else if let Some(id) = stem.strip_prefix("budget-") {
                    id.parse().ok().map(|id| RecordKey::Budget(EntityId(id)))
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Map => write!(f, "map"),
            RecordKey::Token(id) => write!(f, "{id}"),
            RecordKey::Budget(actor) => write!(f, "budget:{actor}"),
            RecordKey::Turns => write!(f, "turns"),
        }
    }
}

/// Terrain layout without tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayout {
    pub dimensions: MapDimensions,
    pub cells: Vec<TerrainCell>,
}

impl MapLayout {
    pub fn of(map: &GridMap) -> Self {
        Self {
            dimensions: map.dimensions(),
            cells: map.cells().to_vec(),
        }
    }
}

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Map(MapLayout),
    Token(Token),
    Budget {
        actor: EntityId,
        budget: MovementBudget,
    },
    Turns(TurnTracker),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::Map(_) => RecordKey::Map,
            Record::Token(token) => RecordKey::Token(token.id),
            Record::Budget { actor, .. } => RecordKey::Budget(*actor),
            Record::Turns(_) => RecordKey::Turns,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Record::Map(_) => "map",
            Record::Token(_) => "token",
            Record::Budget { .. } => "budget",
            Record::Turns(_) => "turns",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordChange {
    Put(Record),
    Delete(RecordKey),
}

impl RecordChange {
    pub fn key(&self) -> RecordKey {
        match self {
            RecordChange::Put(record) => record.key(),
            RecordChange::Delete(key) => *key,
        }
    }
}

/// Records that must be persisted together, stamped with the encounter
/// revision they produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBatch {
    pub revision: u64,
    pub changes: Vec<RecordChange>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

/// Everything a repository holds for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSession {
    pub revision: u64,
    pub records: BTreeMap<RecordKey, Record>,
}

impl StoredSession {
    pub fn apply(&mut self, batch: &CommitBatch) {
        for change in &batch.changes {
            match change {
                RecordChange::Put(record) => {
                    self.records.insert(record.key(), record.clone());
                }
                RecordChange::Delete(key) => {
                    self.records.remove(key);
                }
            }
        }
        self.revision = batch.revision;
    }

    /// Reassembles the encounter. Actors without a stored budget fall back to
    /// `config.default_speed`.
    pub fn into_encounter(self, config: &GameConfig) -> Result<Encounter> {
        let mut layout = None;
        let mut tokens = Vec::new();
        let mut ledger = MovementLedger::new(config.default_speed);
        let mut turns = TurnTracker::new();

        for (key, record) in self.records {
            if record.key() != key {
                return Err(RepositoryError::MismatchedRecord {
                    key: key.to_string(),
                    found: record.kind(),
                });
            }
            match record {
                Record::Map(map) => layout = Some(map),
                Record::Token(token) => tokens.push(token),
                Record::Budget { actor, budget } => ledger.restore(actor, budget),
                Record::Turns(tracker) => turns = tracker,
            }
        }

        let layout = layout.ok_or(RepositoryError::MissingRecord("map"))?;
        let mut map = GridMap::from_cells(layout.dimensions, layout.cells)
            .map_err(|e| RepositoryError::CorruptedData(e.to_string()))?;
        for token in tokens {
            map.place_token(token)
                .map_err(|e| RepositoryError::CorruptedData(e.to_string()))?;
        }

        Ok(Encounter::from_parts(map, ledger, turns, self.revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip() {
        for key in [
            RecordKey::Map,
            RecordKey::Turns,
            RecordKey::Token(TokenId(12)),
            RecordKey::Budget(EntityId(7)),
        ] {
            assert_eq!(RecordKey::from_file_name(&key.file_name()), Some(key));
        }
        assert_eq!(RecordKey::from_file_name("token-x.json"), None);
        assert_eq!(RecordKey::from_file_name("session.json"), None);
    }

    #[test]
    fn missing_map_is_reported() {
        let stored = StoredSession::default();
        assert!(matches!(
            stored.into_encounter(&GameConfig::default()),
            Err(RepositoryError::MissingRecord("map"))
        ));
    }
}
