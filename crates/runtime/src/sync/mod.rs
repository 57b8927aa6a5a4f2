//! Participant-side synchronization.
//!
//! - [`LocalView`] holds the last authoritative snapshot plus optimistic
//!   token positions.
//! - [`OptimisticClient`] shows moves before the host confirms them and
//!   rolls them back on any failure.
//! - [`Reconciler`] is the one path through which authoritative state reaches
//!   the view, whether prompted by a push notification or by polling.

mod optimistic;
mod reconciler;
mod transport;
mod view;

pub use optimistic::{OptimisticClient, OptimisticMove};
pub use reconciler::Reconciler;
pub use transport::SessionTransport;
pub use view::{LocalView, RefreshOutcome, SharedView, read_view, write_view};
