//! Authoritative session host and participant synchronization.
//!
//! This crate wires the pure rules of `tabletop-core` into a running session:
//! a single worker owns the encounter, every mutation is committed through
//! the mutation gateway before it becomes visible, and confirmed changes are
//! broadcast to participants. Hosts embed [`Runtime`] and hand out
//! [`SessionHandle`]s; participants keep a [`sync::LocalView`] current with
//! [`sync::OptimisticClient`] and [`sync::Reconciler`].
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic-based notification bus
//! - [`gateway`] turns encounter changes into atomic commit batches
//! - [`repository`] persists session records
//! - [`sync`] keeps participant views consistent with the host
//! - [`workers`] keeps background tasks internal to the crate
pub mod api;
pub mod events;
pub mod gateway;
pub mod repository;
pub mod runtime;
pub mod snapshot;
pub mod sync;

mod workers;

pub use api::{
    ErrorKind, InitiativeParticipant, MoveOutcome, MoveRequest, Result, RuntimeError,
    SessionHandle,
};
pub use events::{EventBus, Notification, Topic, TopicSubscriptions};
pub use gateway::MutationGateway;
pub use repository::{
    CommitBatch, FileSessionStore, InMemorySessionStore, Record, RecordChange, RecordKey,
    RepositoryError, SessionRepository, StoredSession,
};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use snapshot::SessionSnapshot;
pub use sync::{LocalView, OptimisticClient, OptimisticMove, Reconciler, SessionTransport};
