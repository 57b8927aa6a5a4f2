//! Full-state snapshots returned by `refresh`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tabletop_core::{Encounter, GridMap, PausedTurn, TurnRecord};

/// The entire authoritative state at one revision: grid, tokens, budgets
/// and the active/paused turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub encounter: Encounter,
}

impl SessionSnapshot {
    pub fn new(encounter: Encounter) -> Self {
        Self {
            revision: encounter.revision(),
            encounter,
        }
    }

    pub fn map(&self) -> &GridMap {
        self.encounter.map()
    }

    pub fn active_turn(&self) -> Option<&TurnRecord> {
        self.encounter.active_turn()
    }

    pub fn paused_turns(&self) -> &[PausedTurn] {
        self.encounter.turns().paused()
    }

    /// Deterministic byte encoding of the snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Hex SHA-256 over [`SessionSnapshot::to_bytes`]. Two snapshots with the
    /// same digest are bitwise identical.
    pub fn digest(&self) -> Result<String, bincode::Error> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{
        GameConfig, MapDimensions, Position, TerrainCell, TerrainKind, Token, TokenId, TokenKind,
    };

    fn encounter() -> Encounter {
        let map = GridMap::filled(
            MapDimensions::new(4, 4),
            TerrainCell::new(TerrainKind::Grass),
        )
        .unwrap();
        let mut encounter = Encounter::new(map, &GameConfig::default());
        encounter
            .place_token(Token::new(TokenId(1), TokenKind::Object, Position::new(1, 1)))
            .unwrap();
        encounter
    }

    #[test]
    fn maps_that_break_their_layout_do_not_deserialize() {
        let map = encounter().map().clone();
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(serde_json::from_value::<GridMap>(value.clone()).unwrap(), map);

        let mut truncated = value.clone();
        truncated["cells"].as_array_mut().unwrap().pop();
        let err = serde_json::from_value::<GridMap>(truncated).unwrap_err();
        assert!(err.to_string().contains("cells"));

        let mut stray = value;
        stray["tokens"]["1"]["position"] = serde_json::json!({ "x": 9, "y": 9 });
        assert!(serde_json::from_value::<GridMap>(stray).is_err());
    }

    #[test]
    fn digest_is_stable_and_hex() {
        let snapshot = SessionSnapshot::new(encounter());
        let first = snapshot.digest().unwrap();
        let second = snapshot.clone().digest().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_changes_with_state() {
        let before = SessionSnapshot::new(encounter());
        let mut changed = encounter();
        changed
            .attempt_move(TokenId(1), Position::new(2, 1), true)
            .unwrap();
        assert_ne!(
            before.digest().unwrap(),
            SessionSnapshot::new(changed).digest().unwrap()
        );
    }
}
