//! Push notification payloads.

use serde::{Deserialize, Serialize};

use tabletop_core::{EntityId, MovementBudget, PausedTurn, Token, TokenId, TurnRecord};

use super::bus::Topic;

/// A confirmed change, tagged by kind and carrying the new authoritative
/// snapshot of the affected entity.
///
/// On the wire the tag is the `type` field. Tags this build does not know
/// decode to [`Notification::Unknown`], which consumers treat as "refresh
/// everything".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    TokenMoved {
        token: Token,
        revision: u64,
    },
    TokenPlaced {
        token: Token,
        revision: u64,
    },
    TokenRemoved {
        token_id: TokenId,
        revision: u64,
    },
    TurnChanged {
        active: Option<TurnRecord>,
        paused: Vec<PausedTurn>,
        revision: u64,
    },
    BudgetUpdated {
        actor: EntityId,
        budget: MovementBudget,
        revision: u64,
    },
    #[serde(other)]
    Unknown,
}

impl Notification {
    pub fn topic(&self) -> Topic {
        match self {
            Notification::TokenMoved { .. }
            | Notification::TokenPlaced { .. }
            | Notification::TokenRemoved { .. }
            | Notification::Unknown => Topic::Token,
            Notification::TurnChanged { .. } => Topic::Turn,
            Notification::BudgetUpdated { .. } => Topic::Budget,
        }
    }

    /// Encounter revision this change produced; `None` for unknown tags.
    pub fn revision(&self) -> Option<u64> {
        match self {
            Notification::TokenMoved { revision, .. }
            | Notification::TokenPlaced { revision, .. }
            | Notification::TokenRemoved { revision, .. }
            | Notification::TurnChanged { revision, .. }
            | Notification::BudgetUpdated { revision, .. } => Some(*revision),
            Notification::Unknown => None,
        }
    }

    pub fn requires_full_refresh(&self) -> bool {
        matches!(self, Notification::Unknown)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decodes a wire payload. Anything unrecognisable becomes `Unknown`.
    pub fn decode(payload: &str) -> Self {
        serde_json::from_str(payload).unwrap_or_else(|err| {
            tracing::debug!("undecodable notification treated as unknown: {}", err);
            Notification::Unknown
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{Cost, Position, TokenKind};

    #[test]
    fn tags_are_snake_case() {
        let moved = Notification::TokenMoved {
            token: Token::new(TokenId(4), TokenKind::Npc, Position::new(1, 2)),
            revision: 9,
        };
        let json = moved.to_json().unwrap();
        assert!(json.contains(r#""type":"token_moved""#));
        assert_eq!(Notification::decode(&json), moved);

        let budget = Notification::BudgetUpdated {
            actor: EntityId(1),
            budget: MovementBudget::new(Cost::squares(6)),
            revision: 2,
        };
        assert_eq!(budget.topic(), Topic::Budget);
        assert!(!budget.requires_full_refresh());
    }

    #[test]
    fn unrecognized_tag_requests_full_refresh() {
        let unknown = Notification::decode(r#"{"type":"fog_revealed","cells":[[1,2]]}"#);
        assert_eq!(unknown, Notification::Unknown);
        assert!(unknown.requires_full_refresh());
        assert_eq!(unknown.revision(), None);

        assert!(Notification::decode("not json").requires_full_refresh());
    }
}
