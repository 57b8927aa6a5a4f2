//! Turn state machine.
//!
//! Holds at most one active turn plus a LIFO stack of interrupted turns. A
//! paused turn keeps the movement budget its actor had when it was
//! interrupted, so resuming reinstates movement exactly as it was.

use std::fmt;

use crate::budget::MovementBudget;
use crate::error::{ErrorSeverity, GameError};
use crate::map::EntityId;

/// Milliseconds since the Unix epoch. Supplied by the caller; the core never
/// reads a clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TurnKind {
    Player,
    Npc,
    Dm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnRecord {
    pub kind: TurnKind,
    pub entity_id: EntityId,
    pub turn_number: u64,
    pub started_at: Timestamp,
}

/// An interrupted turn awaiting resumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PausedTurn {
    pub record: TurnRecord,
    pub budget: MovementBudget,
}

/// Transition names used in error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnTransition {
    Start,
    Next,
    Interrupt,
    Resume,
    End,
}

/// Coarse machine state, reported alongside rejected transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnStatus {
    /// No active turn and nothing paused.
    Idle,
    /// No active turn, `depth` interrupted turns waiting.
    Interrupted { depth: usize },
    /// A turn is active above `depth` paused turns.
    Active { turn_number: u64, depth: usize },
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnStatus::Idle => write!(f, "idle"),
            TurnStatus::Interrupted { depth } => write!(f, "interrupted ({depth} paused)"),
            TurnStatus::Active { turn_number, depth } => {
                write!(f, "active turn {turn_number} ({depth} paused)")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnError {
    #[error("cannot {transition} while {state}")]
    InvalidTransition {
        transition: TurnTransition,
        state: TurnStatus,
    },

    #[error("initiative order is empty")]
    EmptyInitiative,
}

impl TurnError {
    fn invalid(transition: TurnTransition, state: TurnStatus) -> Self {
        Self::InvalidTransition { transition, state }
    }
}

impl GameError for TurnError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "TURN_INVALID_TRANSITION",
            Self::EmptyInitiative => "TURN_EMPTY_INITIATIVE",
        }
    }
}

/// One participant's initiative roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitiativeRoll {
    pub entity_id: EntityId,
    pub kind: TurnKind,
    pub roll: i32,
    pub modifier: i32,
}

impl InitiativeRoll {
    pub fn total(&self) -> i32 {
        self.roll + self.modifier
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitiativeEntry {
    pub entity_id: EntityId,
    pub kind: TurnKind,
    pub total: i32,
}

/// Ordered list of who acts when. Each entity appears at most once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitiativeOrder {
    entries: Vec<InitiativeEntry>,
}

impl InitiativeOrder {
    /// Keeps the supplied order, dropping repeated entities.
    pub fn new(entries: Vec<InitiativeEntry>) -> Self {
        let mut deduped: Vec<InitiativeEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !deduped.iter().any(|e| e.entity_id == entry.entity_id) {
                deduped.push(entry);
            }
        }
        Self { entries: deduped }
    }

    /// Highest total first; ties go to the higher modifier, then the lower id.
    pub fn from_rolls(mut rolls: Vec<InitiativeRoll>) -> Self {
        rolls.sort_by(|a, b| {
            b.total()
                .cmp(&a.total())
                .then(b.modifier.cmp(&a.modifier))
                .then(a.entity_id.cmp(&b.entity_id))
        });
        Self::new(
            rolls
                .into_iter()
                .map(|roll| InitiativeEntry {
                    entity_id: roll.entity_id,
                    kind: roll.kind,
                    total: roll.total(),
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[InitiativeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn position_of(&self, entity: EntityId) -> Option<usize> {
        self.entries.iter().position(|e| e.entity_id == entity)
    }
}

/// Turn bookkeeping for one encounter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnTracker {
    active: Option<TurnRecord>,
    paused: Vec<PausedTurn>,
    /// Number given to the most recently created turn.
    last_turn_number: u64,
    initiative: InitiativeOrder,
    /// Index into `initiative` of the most recent turn taken in order.
    cursor: Option<usize>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&TurnRecord> {
        self.active.as_ref()
    }

    /// Paused turns, bottom of the stack first.
    pub fn paused(&self) -> &[PausedTurn] {
        &self.paused
    }

    pub fn initiative(&self) -> &InitiativeOrder {
        &self.initiative
    }

    pub fn set_initiative(&mut self, order: InitiativeOrder) {
        self.initiative = order;
        self.cursor = None;
    }

    pub fn status(&self) -> TurnStatus {
        let depth = self.paused.len();
        match (&self.active, depth) {
            (Some(record), _) => TurnStatus::Active {
                turn_number: record.turn_number,
                depth,
            },
            (None, 0) => TurnStatus::Idle,
            (None, depth) => TurnStatus::Interrupted { depth },
        }
    }

    /// Starts a turn for `entity`. Only valid when no turn is active.
    pub fn start(
        &mut self,
        kind: TurnKind,
        entity: EntityId,
        now: Timestamp,
    ) -> Result<TurnRecord, TurnError> {
        if self.active.is_some() {
            return Err(TurnError::invalid(TurnTransition::Start, self.status()));
        }
        if let Some(index) = self.initiative.position_of(entity) {
            self.cursor = Some(index);
        }
        Ok(self.begin(kind, entity, now))
    }

    /// Ends the active turn (if any) and starts the next actor in initiative
    /// order, wrapping after the last.
    pub fn next(&mut self, now: Timestamp) -> Result<TurnRecord, TurnError> {
        if self.initiative.is_empty() {
            return Err(TurnError::EmptyInitiative);
        }

        let anchor = self
            .active
            .and_then(|record| self.initiative.position_of(record.entity_id))
            .or(self.cursor);
        let index = anchor.map_or(0, |i| (i + 1) % self.initiative.len());
        let entry = self.initiative.entries()[index];

        self.active = None;
        self.cursor = Some(index);
        Ok(self.begin(entry.kind, entry.entity_id, now))
    }

    /// Pushes the active turn onto the pause stack, capturing `budget`.
    pub fn interrupt(&mut self, budget: MovementBudget) -> Result<PausedTurn, TurnError> {
        let Some(record) = self.active.take() else {
            return Err(TurnError::invalid(TurnTransition::Interrupt, self.status()));
        };
        let paused = PausedTurn { record, budget };
        self.paused.push(paused);
        Ok(paused)
    }

    /// Reinstates the most recently interrupted turn. Only valid when no turn
    /// is active and the stack is non-empty.
    pub fn resume(&mut self) -> Result<PausedTurn, TurnError> {
        if self.active.is_some() || self.paused.is_empty() {
            return Err(TurnError::invalid(TurnTransition::Resume, self.status()));
        }
        let Some(paused) = self.paused.pop() else {
            return Err(TurnError::invalid(TurnTransition::Resume, self.status()));
        };
        self.active = Some(paused.record);
        Ok(paused)
    }

    /// Discards the active turn without pausing it.
    pub fn end(&mut self) -> Result<TurnRecord, TurnError> {
        self.active
            .take()
            .ok_or_else(|| TurnError::invalid(TurnTransition::End, self.status()))
    }

    /// Drops the active turn and every paused turn.
    pub fn end_encounter(&mut self) {
        self.active = None;
        self.paused.clear();
        self.cursor = None;
    }

    fn begin(&mut self, kind: TurnKind, entity: EntityId, now: Timestamp) -> TurnRecord {
        self.last_turn_number += 1;
        let record = TurnRecord {
            kind,
            entity_id: entity,
            turn_number: self.last_turn_number,
            started_at: now,
        };
        self.active = Some(record);
        record
    }
}
