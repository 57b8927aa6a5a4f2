//! Owned session context for one encounter.
//!
//! [`Encounter`] bundles the grid map, the movement ledger and the turn
//! tracker, and is the only place where the three are changed together.
//! Every operation either applies completely or returns an error with the
//! encounter untouched. Each successful mutation bumps `revision`.

use crate::budget::{MoveError, MovePlan, MovementBudget, MovementLedger, plan_move};
use crate::config::GameConfig;
use crate::map::{EntityId, GridMap, MapError, Position, Token, TokenId};
use crate::terrain::Cost;
use crate::turn::{
    InitiativeOrder, PausedTurn, Timestamp, TurnError, TurnKind, TurnRecord, TurnTracker,
};

/// Read-only answer to "could this actor move there right now?".
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveValidation {
    pub valid: bool,
    /// Path cost, when a path exists.
    pub cost: Option<Cost>,
    pub remaining_budget: Cost,
    /// Why the move would be rejected.
    pub reason: Option<MoveError>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Encounter {
    map: GridMap,
    ledger: MovementLedger,
    turns: TurnTracker,
    revision: u64,
}

impl Encounter {
    pub fn new(map: GridMap, config: &GameConfig) -> Self {
        Self {
            map,
            ledger: MovementLedger::new(config.default_speed),
            turns: TurnTracker::new(),
            revision: 0,
        }
    }

    /// Reassembles an encounter from persisted parts.
    pub fn from_parts(
        map: GridMap,
        ledger: MovementLedger,
        turns: TurnTracker,
        revision: u64,
    ) -> Self {
        Self {
            map,
            ledger,
            turns,
            revision,
        }
    }

    pub fn map(&self) -> &GridMap {
        &self.map
    }

    pub fn ledger(&self) -> &MovementLedger {
        &self.ledger
    }

    pub fn turns(&self) -> &TurnTracker {
        &self.turns
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_turn(&self) -> Option<&TurnRecord> {
        self.turns.active()
    }

    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.map.token(id)
    }

    pub fn budget(&self, actor: EntityId) -> MovementBudget {
        self.ledger.budget(actor)
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    // ===== tokens =====

    pub fn place_token(&mut self, token: Token) -> Result<&Token, MapError> {
        let id = token.id;
        self.map.place_token(token)?;
        self.bump();
        self.map.token(id).ok_or(MapError::TokenNotFound(id))
    }

    pub fn remove_token(&mut self, id: TokenId) -> Result<Token, MapError> {
        let token = self.map.remove_token(id)?;
        self.bump();
        Ok(token)
    }

    pub fn set_speed(&mut self, actor: EntityId, speed: Cost) -> MovementBudget {
        let budget = self.ledger.set_speed(actor, speed);
        self.bump();
        budget
    }

    // ===== movement =====

    /// Read-only precheck, no mutation.
    pub fn validate_movement(&self, token: TokenId, from: Position, to: Position) -> MoveValidation {
        let Some(current) = self.map.token(token) else {
            return MoveValidation {
                valid: false,
                cost: None,
                remaining_budget: Cost::ZERO,
                reason: Some(MoveError::TokenNotFound(token)),
            };
        };
        let remaining_budget = current
            .entity_id
            .map_or(Cost::ZERO, |actor| self.ledger.budget(actor).remaining());

        match plan_move(&self.ledger, &self.map, current, from, to, false) {
            Ok(plan) => MoveValidation {
                valid: true,
                cost: Some(plan.cost),
                remaining_budget,
                reason: None,
            },
            Err(err) => {
                let cost = match &err {
                    MoveError::InsufficientBudget { required, .. } => Some(*required),
                    _ => None,
                };
                MoveValidation {
                    valid: false,
                    cost,
                    remaining_budget,
                    reason: Some(err),
                }
            }
        }
    }

    /// Decision phase for moving `token` from where it stands to `to`.
    pub fn plan_move(
        &self,
        token: TokenId,
        to: Position,
        is_override: bool,
    ) -> Result<MovePlan, MoveError> {
        let current = self.map.token(token).ok_or(MoveError::TokenNotFound(token))?;
        plan_move(&self.ledger, &self.map, current, current.position, to, is_override)
    }

    /// Applies a plan produced by [`Encounter::plan_move`] on this revision.
    pub fn apply_plan(&mut self, plan: &MovePlan) -> Result<&Token, MoveError> {
        let current = self
            .map
            .token(plan.token)
            .ok_or(MoveError::TokenNotFound(plan.token))?;
        if current.position != plan.from {
            return Err(MoveError::OriginMismatch {
                token: plan.token,
                expected: plan.from,
                actual: current.position,
            });
        }
        self.map
            .relocate_token(plan.token, plan.to, plan.path.clone())?;
        self.ledger.apply(plan);
        self.bump();
        self.map
            .token(plan.token)
            .ok_or(MoveError::TokenNotFound(plan.token))
    }

    /// Plan and apply in one step.
    pub fn attempt_move(
        &mut self,
        token: TokenId,
        to: Position,
        is_override: bool,
    ) -> Result<MovePlan, MoveError> {
        let plan = self.plan_move(token, to, is_override)?;
        self.apply_plan(&plan)?;
        Ok(plan)
    }

    // ===== turns =====

    pub fn set_initiative(&mut self, order: InitiativeOrder) {
        self.turns.set_initiative(order);
        self.bump();
    }

    /// Starts a turn and resets that actor's movement.
    pub fn start_turn(
        &mut self,
        kind: TurnKind,
        entity: EntityId,
        now: Timestamp,
    ) -> Result<TurnRecord, TurnError> {
        let record = self.turns.start(kind, entity, now)?;
        self.ledger.reset(entity);
        self.bump();
        Ok(record)
    }

    /// Ends the active turn (if any) and starts the next one in initiative order.
    pub fn next_turn(&mut self, now: Timestamp) -> Result<TurnRecord, TurnError> {
        let record = self.turns.next(now)?;
        self.ledger.reset(record.entity_id);
        self.bump();
        Ok(record)
    }

    /// Pauses the active turn, remembering its actor's current budget.
    pub fn interrupt_turn(&mut self) -> Result<PausedTurn, TurnError> {
        let budget = self
            .turns
            .active()
            .map(|record| self.ledger.budget(record.entity_id))
            .unwrap_or_default();
        let paused = self.turns.interrupt(budget)?;
        self.bump();
        Ok(paused)
    }

    /// Reinstates the last interrupted turn with the budget it had.
    pub fn resume_turn(&mut self) -> Result<TurnRecord, TurnError> {
        let paused = self.turns.resume()?;
        self.ledger.restore(paused.record.entity_id, paused.budget);
        self.bump();
        Ok(paused.record)
    }

    pub fn end_turn(&mut self) -> Result<TurnRecord, TurnError> {
        let record = self.turns.end()?;
        self.bump();
        Ok(record)
    }

    pub fn end_encounter(&mut self) {
        self.turns.end_encounter();
        self.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MapDimensions, TokenKind};
    use crate::terrain::{TerrainCell, TerrainKind};
    use crate::turn::InitiativeEntry;

    const A: EntityId = EntityId(1);
    const X: EntityId = EntityId(50);
    const A_TOKEN: TokenId = TokenId(1);
    const X_TOKEN: TokenId = TokenId(2);

    fn encounter() -> Encounter {
        let map = GridMap::filled(
            MapDimensions::new(8, 8),
            TerrainCell::new(TerrainKind::Grass),
        )
        .unwrap();
        let mut encounter = Encounter::new(map, &GameConfig::default());
        encounter
            .place_token(Token::new(A_TOKEN, TokenKind::Player, Position::ORIGIN).with_entity(A))
            .unwrap();
        encounter
            .place_token(
                Token::new(X_TOKEN, TokenKind::Npc, Position::new(7, 7)).with_entity(X),
            )
            .unwrap();
        encounter.set_speed(A, Cost::squares(5));
        encounter
    }

    #[test]
    fn validation_reports_cost_and_remaining_without_mutating() {
        let encounter = encounter();
        let before = encounter.clone();
        let ok = encounter.validate_movement(A_TOKEN, Position::ORIGIN, Position::new(2, 1));
        assert!(ok.valid);
        assert_eq!(ok.cost, Some(Cost::squares(3)));
        assert_eq!(ok.remaining_budget, Cost::squares(5));

        let too_far = encounter.validate_movement(A_TOKEN, Position::ORIGIN, Position::new(6, 0));
        assert!(!too_far.valid);
        assert_eq!(too_far.cost, Some(Cost::squares(6)));
        assert!(matches!(
            too_far.reason,
            Some(MoveError::InsufficientBudget { .. })
        ));
        assert_eq!(encounter, before);
    }

    #[test]
    fn starting_a_turn_resets_used_movement() {
        let mut encounter = encounter();
        encounter.start_turn(TurnKind::Player, A, Timestamp(0)).unwrap();
        encounter.attempt_move(A_TOKEN, Position::new(3, 0), false).unwrap();
        assert_eq!(encounter.budget(A).used, Cost::squares(3));
        encounter.end_turn().unwrap();
        encounter.start_turn(TurnKind::Player, A, Timestamp(1)).unwrap();
        assert_eq!(encounter.budget(A).used, Cost::ZERO);
    }

    #[test]
    fn interrupt_and_resume_preserve_turn_and_budget() {
        let mut encounter = encounter();
        let original = encounter.start_turn(TurnKind::Player, A, Timestamp(10)).unwrap();
        encounter.attempt_move(A_TOKEN, Position::new(2, 0), false).unwrap();

        let paused = encounter.interrupt_turn().unwrap();
        assert_eq!(paused.record, original);
        assert_eq!(paused.budget.used, Cost::squares(2));

        encounter.start_turn(TurnKind::Dm, X, Timestamp(11)).unwrap();
        encounter.attempt_move(X_TOKEN, Position::new(7, 6), false).unwrap();
        encounter.end_turn().unwrap();

        let resumed = encounter.resume_turn().unwrap();
        assert_eq!(resumed, original);
        assert_eq!(encounter.budget(A).used, Cost::squares(2));
    }

    #[test]
    fn resume_restores_budget_even_if_actor_took_a_nested_turn() {
        let mut encounter = encounter();
        encounter.start_turn(TurnKind::Player, A, Timestamp(0)).unwrap();
        encounter.attempt_move(A_TOKEN, Position::new(4, 0), false).unwrap();
        encounter.interrupt_turn().unwrap();

        // Reactive turn for the same actor resets its live budget.
        encounter.start_turn(TurnKind::Player, A, Timestamp(1)).unwrap();
        encounter.attempt_move(A_TOKEN, Position::new(4, 1), false).unwrap();
        encounter.end_turn().unwrap();

        encounter.resume_turn().unwrap();
        assert_eq!(encounter.budget(A).used, Cost::squares(4));
    }

    #[test]
    fn failed_operations_leave_revision_unchanged() {
        let mut encounter = encounter();
        let revision = encounter.revision();
        assert!(encounter.resume_turn().is_err());
        assert!(encounter.attempt_move(A_TOKEN, Position::new(7, 0), false).is_err());
        assert!(encounter.remove_token(TokenId(404)).is_err());
        assert_eq!(encounter.revision(), revision);
    }

    #[test]
    fn stale_plan_is_refused() {
        let mut encounter = encounter();
        let plan = encounter.plan_move(A_TOKEN, Position::new(1, 0), false).unwrap();
        encounter.attempt_move(A_TOKEN, Position::new(0, 1), false).unwrap();
        assert!(matches!(
            encounter.apply_plan(&plan),
            Err(MoveError::OriginMismatch { .. })
        ));
    }

    #[test]
    fn next_turn_follows_supplied_order() {
        let mut encounter = encounter();
        encounter.set_initiative(InitiativeOrder::new(vec![
            InitiativeEntry {
                entity_id: X,
                kind: TurnKind::Npc,
                total: 18,
            },
            InitiativeEntry {
                entity_id: A,
                kind: TurnKind::Player,
                total: 7,
            },
        ]));
        assert_eq!(encounter.next_turn(Timestamp(0)).unwrap().entity_id, X);
        assert_eq!(encounter.next_turn(Timestamp(1)).unwrap().entity_id, A);
        assert_eq!(encounter.next_turn(Timestamp(2)).unwrap().entity_id, X);
    }
}
