//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, workers, or storage.

pub mod errors;
pub mod handle;
pub mod types;

pub use errors::{ErrorKind, Result, RuntimeError};
pub use handle::SessionHandle;
pub use types::{InitiativeParticipant, MoveOutcome, MoveRequest};
