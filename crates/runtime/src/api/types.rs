//! Request and response payloads of the session API.

use serde::{Deserialize, Serialize};

use tabletop_core::{Cost, EntityId, MovementBudget, Position, Token, TokenId, TurnKind};

/// A request to move a token through the mutation gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub token: TokenId,
    pub to: Position,
    /// Authoritative override: skips the budget check and may push `used`
    /// past `speed`.
    pub is_override: bool,
    /// Reject with `ConcurrentModification` unless the token is still at
    /// this version.
    pub expected_version: Option<u64>,
}

impl MoveRequest {
    pub fn new(token: TokenId, to: Position) -> Self {
        Self {
            token,
            to,
            is_override: false,
            expected_version: None,
        }
    }

    pub fn overriding(mut self) -> Self {
        self.is_override = true;
        self
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Result of a committed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub token: Token,
    /// Updated budget of the token's actor; `None` for actorless tokens.
    pub budget: Option<MovementBudget>,
    pub cost: Cost,
    pub path: Vec<Position>,
    pub revision: u64,
}

/// Someone taking part in an initiative roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeParticipant {
    pub entity_id: EntityId,
    pub kind: TurnKind,
    pub modifier: i32,
}
