//! Client-side replica of the session.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tabletop_core::{Encounter, Position, Token, TokenId};

use crate::snapshot::SessionSnapshot;

/// A view shared between the optimistic client and the reconciler. Locks are
/// never held across an `.await`.
pub type SharedView = Arc<RwLock<LocalView>>;

pub fn read_view(view: &SharedView) -> RwLockReadGuard<'_, LocalView> {
    view.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn write_view(view: &SharedView) -> RwLockWriteGuard<'_, LocalView> {
    view.write().unwrap_or_else(PoisonError::into_inner)
}

/// What [`LocalView::apply_snapshot`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was newer and replaced the replica.
    Adopted { revision: u64 },
    /// The replica already held this revision.
    Unchanged { revision: u64 },
    /// The snapshot was older than the replica and was ignored.
    Stale { held: u64, offered: u64 },
}

/// An optimistic position layered over the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingMove {
    pub(crate) position: Position,
    /// Revision the host committed the move at. The entry stays until a
    /// snapshot at least this new is adopted.
    pub(crate) confirmed_at: Option<u64>,
}

impl PendingMove {
    pub(crate) fn unconfirmed(position: Position) -> Self {
        Self {
            position,
            confirmed_at: None,
        }
    }
}

/// Last authoritative snapshot plus optimistic token positions layered on
/// top of it.
#[derive(Debug, Clone)]
pub struct LocalView {
    snapshot: SessionSnapshot,
    pending: BTreeMap<TokenId, PendingMove>,
}

impl LocalView {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot,
            pending: BTreeMap::new(),
        }
    }

    pub fn shared(self) -> SharedView {
        Arc::new(RwLock::new(self))
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }

    /// Authoritative encounter as last confirmed, without optimistic moves.
    pub fn encounter(&self) -> &Encounter {
        &self.snapshot.encounter
    }

    pub fn authoritative_token(&self, token: TokenId) -> Option<&Token> {
        self.snapshot.encounter.token(token)
    }

    /// Position shown to the user: the optimistic one if a move is in flight.
    pub fn token_position(&self, token: TokenId) -> Option<Position> {
        self.pending
            .get(&token)
            .map(|pending| pending.position)
            .or_else(|| self.authoritative_token(token).map(|t| t.position))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Revision a host-confirmed move of `token` waits for, if it is still
    /// ahead of the snapshot.
    pub fn awaits_revision(&self, token: TokenId) -> Option<u64> {
        self.pending.get(&token).and_then(|pending| pending.confirmed_at)
    }

    pub(crate) fn set_pending(
        &mut self,
        token: TokenId,
        pending: Option<PendingMove>,
    ) -> Option<PendingMove> {
        match pending {
            Some(pending) => self.pending.insert(token, pending),
            None => self.pending.remove(&token),
        }
    }

    /// Marks the optimistic move of `token` to `position` as committed at
    /// `revision`. A later optimistic move of the same token is left alone.
    pub(crate) fn confirm_pending(&mut self, token: TokenId, position: Position, revision: u64) {
        if revision <= self.snapshot.revision {
            if self.pending.get(&token) == Some(&PendingMove::unconfirmed(position)) {
                self.pending.remove(&token);
            }
            return;
        }
        if let Some(pending) = self.pending.get_mut(&token)
            && *pending == PendingMove::unconfirmed(position)
        {
            pending.confirmed_at = Some(revision);
        }
    }

    /// The only place authoritative state enters the replica. Applying the
    /// same snapshot twice leaves the view exactly as applying it once.
    pub fn apply_snapshot(&mut self, snapshot: SessionSnapshot) -> RefreshOutcome {
        let held = self.snapshot.revision;
        let offered = snapshot.revision;
        if offered < held {
            return RefreshOutcome::Stale { held, offered };
        }
        let outcome = if offered == held && snapshot == self.snapshot {
            RefreshOutcome::Unchanged { revision: held }
        } else {
            self.snapshot = snapshot;
            RefreshOutcome::Adopted { revision: offered }
        };
        self.pending
            .retain(|_, pending| pending.confirmed_at.is_none_or(|at| at > offered));
        outcome
    }
}
