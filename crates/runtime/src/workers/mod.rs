//! Worker tasks that back the runtime orchestration.
//!
//! The session worker is the single owner of the authoritative encounter.

mod session;

pub use session::{Command, SessionWorker};
