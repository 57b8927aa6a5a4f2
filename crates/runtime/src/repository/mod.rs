//! Repository layer for the authoritative session state.
//!
//! The session worker hands every mutation to a [`SessionRepository`] as one
//! [`CommitBatch`]; repositories store key-addressable records and hand the
//! whole session back on restart.

mod error;
mod file;
mod memory;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use traits::SessionRepository;
pub use types::{CommitBatch, MapLayout, Record, RecordChange, RecordKey, StoredSession};
