//! Unified error types surfaced by the runtime API.
//!
//! Wraps rule rejections from `tabletop-core`, commit failures from the
//! repository and channel failures between handles and the session worker,
//! and maps each onto a stable reason code.
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use tabletop_core::{ErrorSeverity, GameError, MapError, MoveError, TokenId, TurnError};

pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("token {token} changed before commit: expected version {expected}, found {actual}")]
    ConcurrentModification {
        token: TokenId,
        expected: u64,
        actual: u64,
    },

    #[error("commit did not complete within {after:?}")]
    Timeout { after: Duration },

    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("session worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("runtime requires an encounter or a persisted session to start from")]
    MissingEncounter,
}

/// Reason codes reported to callers alongside a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoPath,
    InsufficientBudget,
    InvalidTransition,
    ConcurrentModification,
    Transport,
    Timeout,
    Storage,
    Validation,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NoPath => "no_path",
            ErrorKind::InsufficientBudget => "insufficient_budget",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::ConcurrentModification => "concurrent_modification",
            ErrorKind::Transport => "transport",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Storage => "storage",
            ErrorKind::Validation => "validation",
        }
    }

    /// Failures where the commit outcome is unknown to the caller.
    pub const fn is_indeterminate(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Move(err) => match err {
                MoveError::NoPath { .. } => ErrorKind::NoPath,
                MoveError::InsufficientBudget { .. } => ErrorKind::InsufficientBudget,
                MoveError::OriginMismatch { .. } => ErrorKind::ConcurrentModification,
                MoveError::TokenNotFound(_) | MoveError::NoActor(_) | MoveError::Map(_) => {
                    ErrorKind::Validation
                }
            },
            RuntimeError::Turn(TurnError::InvalidTransition { .. }) => {
                ErrorKind::InvalidTransition
            }
            RuntimeError::Turn(TurnError::EmptyInitiative) => ErrorKind::Validation,
            RuntimeError::Map(_) | RuntimeError::MissingEncounter => ErrorKind::Validation,
            RuntimeError::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            RuntimeError::Timeout { .. } => ErrorKind::Timeout,
            RuntimeError::CommandChannelClosed
            | RuntimeError::ReplyChannelClosed(_)
            | RuntimeError::WorkerJoin(_)
            | RuntimeError::Transport(_) => ErrorKind::Transport,
            RuntimeError::Repository(_) => ErrorKind::Storage,
        }
    }

    /// Core rejections keep their own severity. Channel, join and storage
    /// failures are internal; timeouts and conflicts can be retried.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RuntimeError::Move(err) => err.severity(),
            RuntimeError::Turn(err) => err.severity(),
            RuntimeError::Map(err) => err.severity(),
            RuntimeError::ConcurrentModification { .. }
            | RuntimeError::Timeout { .. }
            | RuntimeError::Transport(_) => ErrorSeverity::Recoverable,
            RuntimeError::MissingEncounter => ErrorSeverity::Validation,
            RuntimeError::CommandChannelClosed
            | RuntimeError::ReplyChannelClosed(_)
            | RuntimeError::WorkerJoin(_)
            | RuntimeError::Repository(_) => ErrorSeverity::Internal,
        }
    }

    /// Stable code of the underlying core error, when there is one.
    pub fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::Move(err) => err.error_code(),
            RuntimeError::Turn(err) => err.error_code(),
            RuntimeError::Map(err) => err.error_code(),
            _ => self.kind().as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{Cost, Position, TurnStatus, TurnTransition};

    #[test]
    fn core_rejections_map_to_reason_codes() {
        let no_path = RuntimeError::from(MoveError::NoPath {
            from: Position::ORIGIN,
            to: Position::new(1, 1),
        });
        assert_eq!(no_path.kind(), ErrorKind::NoPath);
        assert_eq!(no_path.error_code(), "MOVE_NO_PATH");

        let budget = RuntimeError::from(MoveError::InsufficientBudget {
            required: Cost::squares(6),
            remaining: Cost::squares(5),
        });
        assert_eq!(budget.kind(), ErrorKind::InsufficientBudget);

        let turn = RuntimeError::from(TurnError::InvalidTransition {
            transition: TurnTransition::Resume,
            state: TurnStatus::Idle,
        });
        assert_eq!(turn.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn transport_failures_are_indeterminate() {
        let timeout = RuntimeError::Timeout {
            after: Duration::from_secs(30),
        };
        assert!(timeout.kind().is_indeterminate());
        assert!(RuntimeError::CommandChannelClosed.kind().is_indeterminate());
        assert!(!RuntimeError::MissingEncounter.kind().is_indeterminate());
        assert_eq!(timeout.error_code(), "timeout");
    }

    #[test]
    fn severity_separates_rejections_from_faults() {
        let budget = RuntimeError::from(MoveError::InsufficientBudget {
            required: Cost::squares(6),
            remaining: Cost::squares(5),
        });
        assert!(budget.severity().is_recoverable());

        let turn = RuntimeError::from(TurnError::InvalidTransition {
            transition: TurnTransition::End,
            state: TurnStatus::Idle,
        });
        assert_eq!(turn.severity(), ErrorSeverity::Validation);

        let storage = RuntimeError::from(RepositoryError::from(std::io::Error::other("disk full")));
        assert!(storage.severity().is_internal());
        assert!(RuntimeError::CommandChannelClosed.severity().is_internal());
        assert!(!RuntimeError::Transport("reset".into()).severity().is_internal());
    }
}
