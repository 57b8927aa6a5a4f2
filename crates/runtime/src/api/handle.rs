//! Cloneable façade for issuing commands to the session worker.
//!
//! [`SessionHandle`] hides channel plumbing and offers async helpers for
//! moving tokens, driving turns, and streaming notifications from specific
//! topics. Every request is bounded by the commit timeout; a request that
//! times out is a failure for the caller even if the worker later commits it.
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use tabletop_core::{
    Cost, EntityId, InitiativeOrder, MoveValidation, MovementBudget, PausedTurn, Position, Token,
    TokenId, TurnKind, TurnRecord,
};

use super::errors::{Result, RuntimeError};
use super::types::{InitiativeParticipant, MoveOutcome, MoveRequest};
use crate::events::{EventBus, Notification, Topic, TopicSubscriptions};
use crate::snapshot::SessionSnapshot;
use crate::workers::Command;

/// Client-facing handle to interact with the session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
    commit_timeout: Duration,
}

impl SessionHandle {
    pub(crate) fn new(
        command_tx: mpsc::Sender<Command>,
        event_bus: EventBus,
        commit_timeout: Duration,
    ) -> Self {
        Self {
            command_tx,
            event_bus,
            commit_timeout,
        }
    }

    pub fn commit_timeout(&self) -> Duration {
        self.commit_timeout
    }

    /// Same handle with a different commit timeout.
    pub fn with_commit_timeout(mut self, commit_timeout: Duration) -> Self {
        self.commit_timeout = commit_timeout;
        self
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let exchange = async {
            self.command_tx
                .send(build(reply_tx))
                .await
                .map_err(|_| RuntimeError::CommandChannelClosed)?;
            reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)?
        };

        match tokio::time::timeout(self.commit_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("request timed out after {:?}", self.commit_timeout);
                Err(RuntimeError::Timeout {
                    after: self.commit_timeout,
                })
            }
        }
    }

    /// Read-only precheck: would this move be accepted right now?
    pub async fn validate_movement(
        &self,
        token: TokenId,
        from: Position,
        to: Position,
    ) -> Result<MoveValidation> {
        self.request(|reply| Command::ValidateMovement {
            token,
            from,
            to,
            reply,
        })
        .await
    }

    /// Move a token from where it stands to `to`.
    pub async fn move_token(
        &self,
        token: TokenId,
        to: Position,
        is_override: bool,
    ) -> Result<MoveOutcome> {
        let mut request = MoveRequest::new(token, to);
        request.is_override = is_override;
        self.submit_move(request).await
    }

    /// Like [`SessionHandle::move_token`], but fails with
    /// `ConcurrentModification` if the token moved past `version`.
    pub async fn move_token_expecting(
        &self,
        token: TokenId,
        to: Position,
        is_override: bool,
        version: u64,
    ) -> Result<MoveOutcome> {
        let mut request = MoveRequest::new(token, to).expecting(version);
        request.is_override = is_override;
        self.submit_move(request).await
    }

    pub async fn submit_move(&self, request: MoveRequest) -> Result<MoveOutcome> {
        self.request(|reply| Command::MoveToken { request, reply })
            .await
    }

    pub async fn place_token(&self, token: Token) -> Result<Token> {
        self.request(|reply| Command::PlaceToken { token, reply })
            .await
    }

    pub async fn remove_token(&self, token: TokenId) -> Result<Token> {
        self.request(|reply| Command::RemoveToken { token, reply })
            .await
    }

    pub async fn set_speed(&self, actor: EntityId, speed: Cost) -> Result<MovementBudget> {
        self.request(|reply| Command::SetSpeed {
            actor,
            speed,
            reply,
        })
        .await
    }

    pub async fn start_turn(&self, kind: TurnKind, entity: EntityId) -> Result<TurnRecord> {
        self.request(|reply| Command::StartTurn {
            kind,
            entity,
            reply,
        })
        .await
    }

    pub async fn next_turn(&self) -> Result<TurnRecord> {
        self.request(|reply| Command::NextTurn { reply }).await
    }

    /// Ends the active turn, returning it.
    pub async fn end_turn(&self) -> Result<TurnRecord> {
        self.request(|reply| Command::EndTurn { reply }).await
    }

    /// Pauses the active turn, returning the displaced turn.
    pub async fn interrupt_turn(&self) -> Result<PausedTurn> {
        self.request(|reply| Command::InterruptTurn { reply })
            .await
    }

    pub async fn resume_turn(&self) -> Result<TurnRecord> {
        self.request(|reply| Command::ResumeTurn { reply })
            .await
    }

    /// Rolls d20 + modifier for each participant and installs the resulting
    /// order for [`SessionHandle::next_turn`].
    pub async fn roll_initiative(
        &self,
        participants: Vec<InitiativeParticipant>,
    ) -> Result<InitiativeOrder> {
        self.request(|reply| Command::RollInitiative {
            participants,
            reply,
        })
        .await
    }

    pub async fn end_encounter(&self) -> Result<()> {
        self.request(|reply| Command::EndEncounter { reply })
            .await
    }

    pub async fn active_turn(&self) -> Result<Option<TurnRecord>> {
        self.request(|reply| Command::ActiveTurn { reply })
            .await
    }

    /// Full authoritative state. Two calls without an intervening mutation
    /// return bitwise-identical snapshots.
    pub async fn refresh(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Refresh { reply }).await
    }

    /// Subscribe to notifications from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Token` - token placement, movement and removal
    /// - `Topic::Turn` - active turn and pause stack changes
    /// - `Topic::Budget` - movement budget changes
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Notification> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to every topic at once
    pub fn subscribe_all(&self) -> TopicSubscriptions {
        self.event_bus.subscribe_all()
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
