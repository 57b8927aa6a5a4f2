//! Deterministic movement and turn rules for a tabletop encounter.
//!
//! `tabletop-core` defines the terrain cost model, the pathfinder, the
//! movement budget ledger and the turn state machine. Everything here is pure
//! and synchronous; hosts and clients coordinate state through
//! [`encounter::Encounter`] and the types re-exported below.
pub mod budget;
pub mod config;
pub mod encounter;
pub mod error;
pub mod map;
pub mod path;
pub mod terrain;
pub mod turn;

pub use budget::{MoveError, MovePlan, MovementBudget, MovementLedger, attempt_move, plan_move};
pub use config::GameConfig;
pub use encounter::{Encounter, MoveValidation};
pub use error::{ErrorSeverity, GameError};
pub use map::{
    CardinalDirection, EntityId, GridMap, MapDimensions, MapError, Position, Token, TokenId,
    TokenKind, TokenMetadata,
};
pub use path::{PathResult, Pathfinder, ReachableCell, ReachableSet, cheapest_path, reachable_set};
pub use terrain::{CellCost, Cost, TerrainCell, TerrainKind};
pub use turn::{
    InitiativeEntry, InitiativeOrder, InitiativeRoll, PausedTurn, Timestamp, TurnError, TurnKind,
    TurnRecord, TurnStatus, TurnTracker, TurnTransition,
};
