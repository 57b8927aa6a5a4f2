//! Movement budget ledger.
//!
//! Tracks each actor's movement allowance for the current turn and decides
//! whether a prospective path is affordable. Deciding ([`plan_move`]) is kept
//! apart from applying ([`MovementLedger::apply`]) so the host can run the
//! pure decision phase synchronously and commit the outcome later as one unit.

use std::collections::BTreeMap;

use crate::error::{ErrorSeverity, GameError};
use crate::map::{EntityId, GridMap, MapError, Position, Token, TokenId};
use crate::path::cheapest_path;
use crate::terrain::Cost;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MoveError {
    #[error("no valid path from {from} to {to}")]
    NoPath { from: Position, to: Position },

    #[error("insufficient movement budget: path costs {required}, {remaining} remaining")]
    InsufficientBudget { required: Cost, remaining: Cost },

    #[error("token {0} not found")]
    TokenNotFound(TokenId),

    #[error("token {token} is at {actual}, not {expected}")]
    OriginMismatch {
        token: TokenId,
        expected: Position,
        actual: Position,
    },

    #[error("token {0} has no actor and can only be moved by override")]
    NoActor(TokenId),

    #[error(transparent)]
    Map(#[from] MapError),
}

impl GameError for MoveError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NoPath { .. } | Self::InsufficientBudget { .. } => ErrorSeverity::Recoverable,
            Self::OriginMismatch { .. } => ErrorSeverity::Recoverable,
            Self::TokenNotFound(_) | Self::NoActor(_) => ErrorSeverity::Validation,
            Self::Map(inner) => inner.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NoPath { .. } => "MOVE_NO_PATH",
            Self::InsufficientBudget { .. } => "MOVE_INSUFFICIENT_BUDGET",
            Self::TokenNotFound(_) => "MOVE_TOKEN_NOT_FOUND",
            Self::OriginMismatch { .. } => "MOVE_ORIGIN_MISMATCH",
            Self::NoActor(_) => "MOVE_NO_ACTOR",
            Self::Map(inner) => inner.error_code(),
        }
    }
}

/// Movement allowance of one actor for the current turn.
///
/// Invariant: `used <= speed` unless an authoritative override pushed it past.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementBudget {
    pub speed: Cost,
    pub used: Cost,
}

impl MovementBudget {
    pub const fn new(speed: Cost) -> Self {
        Self {
            speed,
            used: Cost::ZERO,
        }
    }

    /// `max(0, speed - used)`.
    pub const fn remaining(&self) -> Cost {
        self.speed.saturating_sub(self.used)
    }

    pub fn can_afford(&self, cost: Cost) -> bool {
        cost <= self.remaining()
    }

    /// True only after an override move spent more than the allowance.
    pub fn is_exceeded(&self) -> bool {
        self.used > self.speed
    }

    /// Budget after spending `cost`. Normal moves are capped at `speed`;
    /// overrides are not. `used` never goes down.
    pub fn after_spending(&self, cost: Cost, is_override: bool) -> Self {
        let used = if is_override {
            self.used + cost
        } else {
            (self.used + cost).min(self.speed).max(self.used)
        };
        Self {
            speed: self.speed,
            used,
        }
    }

    pub fn reset(&mut self) {
        self.used = Cost::ZERO;
    }
}

/// Per-actor movement budgets for the encounter.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovementLedger {
    default_speed: Cost,
    budgets: BTreeMap<EntityId, MovementBudget>,
}

impl MovementLedger {
    pub fn new(default_speed: Cost) -> Self {
        Self {
            default_speed,
            budgets: BTreeMap::new(),
        }
    }

    pub fn default_speed(&self) -> Cost {
        self.default_speed
    }

    /// Current budget of `actor`; actors never seen get a fresh default budget.
    pub fn budget(&self, actor: EntityId) -> MovementBudget {
        self.budgets
            .get(&actor)
            .copied()
            .unwrap_or_else(|| MovementBudget::new(self.default_speed))
    }

    pub fn budgets(&self) -> impl Iterator<Item = (EntityId, MovementBudget)> + '_ {
        self.budgets.iter().map(|(id, budget)| (*id, *budget))
    }

    /// Sets the total allowance of `actor`, keeping what was already spent.
    pub fn set_speed(&mut self, actor: EntityId, speed: Cost) -> MovementBudget {
        let mut budget = self.budget(actor);
        budget.speed = speed;
        self.budgets.insert(actor, budget);
        budget
    }

    /// Starts a fresh turn for `actor`: `used` returns to zero.
    pub fn reset(&mut self, actor: EntityId) -> MovementBudget {
        let mut budget = self.budget(actor);
        budget.reset();
        self.budgets.insert(actor, budget);
        budget
    }

    /// Reinstates a previously captured budget exactly.
    pub fn restore(&mut self, actor: EntityId, budget: MovementBudget) {
        self.budgets.insert(actor, budget);
    }

    /// Applies a decided move's budget change.
    pub fn apply(&mut self, plan: &MovePlan) {
        if let Some(actor) = plan.actor {
            self.budgets.insert(actor, plan.budget_after);
        }
    }
}

/// Outcome of the decision phase: everything needed to commit a move.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovePlan {
    pub token: TokenId,
    pub actor: Option<EntityId>,
    pub from: Position,
    pub to: Position,
    pub path: Vec<Position>,
    pub cost: Cost,
    pub budget_before: MovementBudget,
    pub budget_after: MovementBudget,
    pub is_override: bool,
}

impl MovePlan {
    pub fn updated_used(&self) -> Cost {
        self.budget_after.used
    }
}

/// Decides whether `token` may travel `from -> to`. Pure; nothing is mutated.
///
/// Tokens without an actor have no budget and move only by override.
pub fn plan_move(
    ledger: &MovementLedger,
    map: &GridMap,
    token: &Token,
    from: Position,
    to: Position,
    is_override: bool,
) -> Result<MovePlan, MoveError> {
    if token.position != from {
        return Err(MoveError::OriginMismatch {
            token: token.id,
            expected: from,
            actual: token.position,
        });
    }

    let route = cheapest_path(map, from, to).ok_or(MoveError::NoPath { from, to })?;

    let (budget_before, budget_after) = match token.entity_id {
        Some(actor) => {
            let before = ledger.budget(actor);
            if !is_override && !before.can_afford(route.cost) {
                return Err(MoveError::InsufficientBudget {
                    required: route.cost,
                    remaining: before.remaining(),
                });
            }
            (before, before.after_spending(route.cost, is_override))
        }
        None if is_override => (MovementBudget::default(), MovementBudget::default()),
        None => return Err(MoveError::NoActor(token.id)),
    };

    Ok(MovePlan {
        token: token.id,
        actor: token.entity_id,
        from,
        to,
        path: route.path,
        cost: route.cost,
        budget_before,
        budget_after,
        is_override,
    })
}

/// Decides and applies a move in memory. Either both the token position and
/// the ledger change, or neither does.
pub fn attempt_move(
    ledger: &mut MovementLedger,
    map: &mut GridMap,
    token: TokenId,
    from: Position,
    to: Position,
    is_override: bool,
) -> Result<MovePlan, MoveError> {
    let current = map.token(token).ok_or(MoveError::TokenNotFound(token))?;
    let plan = plan_move(ledger, map, current, from, to, is_override)?;
    map.relocate_token(plan.token, plan.to, plan.path.clone())?;
    ledger.apply(&plan);
    Ok(plan)
}
