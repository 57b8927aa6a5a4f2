//! Mutation gateway: the single path from a decided change to storage.
//!
//! The session worker applies a change to a copy of the encounter, then asks
//! the gateway to persist the difference. The gateway stages every affected
//! record (token, budget, turn state) into one [`CommitBatch`], commits it
//! all-or-nothing, and reports the notifications to broadcast once the
//! commit is durable.

use std::collections::BTreeMap;
use std::sync::Arc;

use tabletop_core::Encounter;

use crate::events::Notification;
use crate::repository::{
    CommitBatch, MapLayout, Record, RecordChange, RecordKey, Result, SessionRepository,
};

#[derive(Clone)]
pub struct MutationGateway {
    repository: Arc<dyn SessionRepository>,
}

impl MutationGateway {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn SessionRepository> {
        &self.repository
    }

    /// Persists every record of `encounter`. Used when a session is created.
    pub async fn commit_initial(&self, encounter: &Encounter) -> Result<()> {
        let batch = stage(None, encounter);
        self.repository.commit(&batch).await?;
        tracing::info!(
            revision = batch.revision,
            records = batch.len(),
            "persisted initial session"
        );
        Ok(())
    }

    /// Persists the difference between `before` and `after` and returns the
    /// notifications describing it.
    pub async fn commit(&self, before: &Encounter, after: &Encounter) -> Result<Vec<Notification>> {
        let batch = stage(Some(before), after);
        self.repository.commit(&batch).await?;
        Ok(notifications(before, &batch))
    }
}

/// Records of `after` that differ from `before`; everything when `before` is
/// `None`.
pub fn stage(before: Option<&Encounter>, after: &Encounter) -> CommitBatch {
    let mut changes = Vec::new();

    let layout_changed = before.is_none_or(|before| {
        before.map().dimensions() != after.map().dimensions()
            || before.map().cells() != after.map().cells()
    });
    if layout_changed {
        changes.push(RecordChange::Put(Record::Map(MapLayout::of(after.map()))));
    }

    for token in after.map().tokens() {
        let unchanged = before.is_some_and(|before| before.token(token.id) == Some(token));
        if !unchanged {
            changes.push(RecordChange::Put(Record::Token(token.clone())));
        }
    }
    if let Some(before) = before {
        for token in before.map().tokens() {
            if after.token(token.id).is_none() {
                changes.push(RecordChange::Delete(RecordKey::Token(token.id)));
            }
        }
    }

    let previous_budgets: BTreeMap<_, _> = before
        .map(|before| before.ledger().budgets().collect())
        .unwrap_or_default();
    for (actor, budget) in after.ledger().budgets() {
        if previous_budgets.get(&actor) != Some(&budget) {
            changes.push(RecordChange::Put(Record::Budget { actor, budget }));
        }
    }

    if before.is_none_or(|before| before.turns() != after.turns()) {
        changes.push(RecordChange::Put(Record::Turns(after.turns().clone())));
    }

    CommitBatch {
        revision: after.revision(),
        changes,
    }
}

/// Notifications for a committed batch, in batch order.
pub fn notifications(before: &Encounter, batch: &CommitBatch) -> Vec<Notification> {
    let revision = batch.revision;
    batch
        .changes
        .iter()
        .filter_map(|change| match change {
            RecordChange::Put(Record::Token(token)) => {
                let token = token.clone();
                Some(if before.token(token.id).is_some() {
                    Notification::TokenMoved { token, revision }
                } else {
                    Notification::TokenPlaced { token, revision }
                })
            }
            RecordChange::Delete(RecordKey::Token(token_id)) => Some(Notification::TokenRemoved {
                token_id: *token_id,
                revision,
            }),
            RecordChange::Put(Record::Budget { actor, budget }) => {
                Some(Notification::BudgetUpdated {
                    actor: *actor,
                    budget: *budget,
                    revision,
                })
            }
            RecordChange::Put(Record::Turns(turns)) => Some(Notification::TurnChanged {
                active: turns.active().copied(),
                paused: turns.paused().to_vec(),
                revision,
            }),
            RecordChange::Put(Record::Map(_)) | RecordChange::Delete(_) => None,
        })
        .collect()
}
