//! Optimistic moves with guaranteed rollback.
//!
//! A move is shown locally before the host confirms it. Every way the
//! request can end other than success (rejection, transport failure,
//! timeout, or the caller dropping the future) runs the same compensating
//! action, which restores the token to where the view showed it before.
//! A confirmed move keeps showing its destination until a snapshot at the
//! committed revision reaches the view.

use std::time::Duration;

use tracing::{debug, warn};

use tabletop_core::{Position, TokenId};

use crate::api::{MoveOutcome, MoveRequest, Result};

use super::reconciler::Reconciler;
use super::transport::SessionTransport;
use super::view::{LocalView, PendingMove, RefreshOutcome, SharedView, read_view, write_view};

/// Forward and compensating action of one optimistic move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticMove {
    token: TokenId,
    to: Position,
    /// Optimistic entry the token had before this move, if any.
    previous: Option<PendingMove>,
}

impl OptimisticMove {
    /// Shows `token` at `to` in `view`.
    pub fn apply(view: &mut LocalView, token: TokenId, to: Position) -> Self {
        let previous = view.set_pending(token, Some(PendingMove::unconfirmed(to)));
        Self {
            token,
            to,
            previous,
        }
    }

    pub fn token(&self) -> TokenId {
        self.token
    }

    pub fn destination(&self) -> Position {
        self.to
    }

    /// Undoes [`OptimisticMove::apply`] exactly.
    pub fn compensate(self, view: &mut LocalView) {
        view.set_pending(self.token, self.previous);
    }

    /// Records that the host committed the move at `revision`. The view keeps
    /// the destination until it adopts a snapshot that new.
    pub fn confirm(self, view: &mut LocalView, revision: u64) {
        view.confirm_pending(self.token, self.to, revision);
    }
}

/// Compensates on drop unless confirmed.
struct InFlight<'a> {
    view: &'a SharedView,
    mv: Option<OptimisticMove>,
}

impl InFlight<'_> {
    fn confirm(mut self, revision: u64) {
        if let Some(mv) = self.mv.take() {
            mv.confirm(&mut write_view(self.view), revision);
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(mv) = self.mv.take() {
            debug!(token = %mv.token, "rolling back optimistic move");
            mv.compensate(&mut write_view(self.view));
        }
    }
}

/// Participant-side move flow: advisory local check, optimistic apply,
/// authoritative request, then reconcile or roll back.
pub struct OptimisticClient<T> {
    reconciler: Reconciler<T>,
}

impl<T: SessionTransport> OptimisticClient<T> {
    pub fn new(reconciler: Reconciler<T>) -> Self {
        Self { reconciler }
    }

    /// Builds a view from a first full refresh.
    pub async fn connect(transport: T, poll_interval: Duration) -> Result<Self> {
        let snapshot = transport.refresh().await?;
        let view = LocalView::new(snapshot).shared();
        Ok(Self::new(Reconciler::new(transport, view, poll_interval)))
    }

    pub fn view(&self) -> &SharedView {
        self.reconciler.view()
    }

    pub fn reconciler(&self) -> &Reconciler<T> {
        &self.reconciler
    }

    pub fn token_position(&self, token: TokenId) -> Option<Position> {
        read_view(self.view()).token_position(token)
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.reconciler.refresh().await
    }

    /// Moves a token optimistically.
    ///
    /// A move the local replica already rejects is never sent. The request
    /// carries the token version the replica holds, so a move made elsewhere
    /// in the meantime fails with `ConcurrentModification`. On success the
    /// view is reconciled through a full refresh; on any failure the token is
    /// back where it was shown before the call.
    pub async fn move_token(
        &self,
        token: TokenId,
        to: Position,
        is_override: bool,
    ) -> Result<MoveOutcome> {
        let (request, in_flight) = {
            let mut view = write_view(self.view());
            view.encounter().plan_move(token, to, is_override)?;

            let mut request = MoveRequest::new(token, to);
            if is_override {
                request = request.overriding();
            }
            if let Some(held) = view.authoritative_token(token) {
                request = request.expecting(held.version);
            }
            let in_flight = InFlight {
                view: self.view(),
                mv: Some(OptimisticMove::apply(&mut view, token, to)),
            };
            (request, in_flight)
        };

        match self.reconciler.transport().move_token(request).await {
            Ok(outcome) => {
                in_flight.confirm(outcome.revision);
                if let Err(err) = self.reconciler.refresh().await {
                    warn!(reason = %err.kind(), "refresh after confirmed move failed: {}", err);
                }
                Ok(outcome)
            }
            Err(err) => {
                drop(in_flight);
                warn!(token = %token, reason = %err.kind(), "move failed, rolled back: {}", err);
                Err(err)
            }
        }
    }
}
