//! Session worker that owns the authoritative [`Encounter`].
//!
//! Receives commands from [`crate::SessionHandle`] strictly in arrival order.
//! Every mutation runs against a copy of the encounter; the copy replaces the
//! authoritative state only after the [`MutationGateway`] committed it, and
//! only then are notifications published.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use tabletop_core::{
    Cost, Encounter, EntityId, InitiativeOrder, InitiativeRoll, MoveError, MoveValidation,
    MovementBudget, PausedTurn, Position, Timestamp, Token, TokenId, TurnKind, TurnRecord,
};

use crate::api::{InitiativeParticipant, MoveOutcome, MoveRequest, Result, RuntimeError};
use crate::events::EventBus;
use crate::gateway::MutationGateway;
use crate::snapshot::SessionSnapshot;

/// Commands that can be sent to the session worker
pub enum Command {
    ValidateMovement {
        token: TokenId,
        from: Position,
        to: Position,
        reply: oneshot::Sender<Result<MoveValidation>>,
    },
    MoveToken {
        request: MoveRequest,
        reply: oneshot::Sender<Result<MoveOutcome>>,
    },
    PlaceToken {
        token: Token,
        reply: oneshot::Sender<Result<Token>>,
    },
    RemoveToken {
        token: TokenId,
        reply: oneshot::Sender<Result<Token>>,
    },
    SetSpeed {
        actor: EntityId,
        speed: Cost,
        reply: oneshot::Sender<Result<MovementBudget>>,
    },
    StartTurn {
        kind: TurnKind,
        entity: EntityId,
        reply: oneshot::Sender<Result<TurnRecord>>,
    },
    NextTurn {
        reply: oneshot::Sender<Result<TurnRecord>>,
    },
    EndTurn {
        reply: oneshot::Sender<Result<TurnRecord>>,
    },
    InterruptTurn {
        reply: oneshot::Sender<Result<PausedTurn>>,
    },
    ResumeTurn {
        reply: oneshot::Sender<Result<TurnRecord>>,
    },
    RollInitiative {
        participants: Vec<InitiativeParticipant>,
        reply: oneshot::Sender<Result<InitiativeOrder>>,
    },
    EndEncounter {
        reply: oneshot::Sender<Result<()>>,
    },
    /// Read-only
    ActiveTurn {
        reply: oneshot::Sender<Result<Option<TurnRecord>>>,
    },
    /// Read-only full state
    Refresh {
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },
}

/// Background task that processes session commands.
pub struct SessionWorker {
    encounter: Encounter,
    gateway: MutationGateway,
    command_rx: mpsc::Receiver<Command>,
    shutdown_rx: oneshot::Receiver<()>,
    event_bus: EventBus,
    rng: StdRng,
}

impl SessionWorker {
    pub fn new(
        encounter: Encounter,
        gateway: MutationGateway,
        command_rx: mpsc::Receiver<Command>,
        shutdown_rx: oneshot::Receiver<()>,
        event_bus: EventBus,
        initiative_seed: Option<u64>,
    ) -> Self {
        info!(
            revision = encounter.revision(),
            tokens = encounter.map().token_count(),
            "SessionWorker initialized"
        );

        let rng = match initiative_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            encounter,
            gateway,
            command_rx,
            shutdown_rx,
            event_bus,
            rng,
        }
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = &mut self.shutdown_rx => {
                    info!("SessionWorker shutting down");
                    break;
                }
                else => break,
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ValidateMovement {
                token,
                from,
                to,
                reply,
            } => {
                let result = Ok(self.encounter.validate_movement(token, from, to));
                respond(reply, result, "ValidateMovement");
            }
            Command::MoveToken { request, reply } => {
                let result = self.handle_move(request).await;
                respond(reply, result, "MoveToken");
            }
            Command::PlaceToken { token, reply } => {
                let result = self
                    .mutate(|encounter| Ok(encounter.place_token(token)?.clone()))
                    .await;
                respond(reply, result, "PlaceToken");
            }
            Command::RemoveToken { token, reply } => {
                let result = self
                    .mutate(|encounter| Ok(encounter.remove_token(token)?))
                    .await;
                respond(reply, result, "RemoveToken");
            }
            Command::SetSpeed {
                actor,
                speed,
                reply,
            } => {
                let result = self
                    .mutate(|encounter| Ok(encounter.set_speed(actor, speed)))
                    .await;
                respond(reply, result, "SetSpeed");
            }
            Command::StartTurn {
                kind,
                entity,
                reply,
            } => {
                let now = now();
                let result = self
                    .mutate(|encounter| Ok(encounter.start_turn(kind, entity, now)?))
                    .await;
                respond(reply, result, "StartTurn");
            }
            Command::NextTurn { reply } => {
                let now = now();
                let result = self
                    .mutate(|encounter| Ok(encounter.next_turn(now)?))
                    .await;
                respond(reply, result, "NextTurn");
            }
            Command::EndTurn { reply } => {
                let result = self.mutate(|encounter| Ok(encounter.end_turn()?)).await;
                respond(reply, result, "EndTurn");
            }
            Command::InterruptTurn { reply } => {
                let result = self
                    .mutate(|encounter| Ok(encounter.interrupt_turn()?))
                    .await;
                respond(reply, result, "InterruptTurn");
            }
            Command::ResumeTurn { reply } => {
                let result = self.mutate(|encounter| Ok(encounter.resume_turn()?)).await;
                respond(reply, result, "ResumeTurn");
            }
            Command::RollInitiative {
                participants,
                reply,
            } => {
                let order = self.roll_initiative(participants);
                let result = self
                    .mutate(|encounter| {
                        encounter.set_initiative(order.clone());
                        Ok(order)
                    })
                    .await;
                respond(reply, result, "RollInitiative");
            }
            Command::EndEncounter { reply } => {
                let result = self
                    .mutate(|encounter| {
                        encounter.end_encounter();
                        Ok(())
                    })
                    .await;
                respond(reply, result, "EndEncounter");
            }
            Command::ActiveTurn { reply } => {
                respond(reply, Ok(self.encounter.active_turn().copied()), "ActiveTurn");
            }
            Command::Refresh { reply } => {
                let snapshot = SessionSnapshot::new(self.encounter.clone());
                respond(reply, Ok(snapshot), "Refresh");
            }
        }
    }

    async fn handle_move(&mut self, request: MoveRequest) -> Result<MoveOutcome> {
        let MoveRequest {
            token,
            to,
            is_override,
            expected_version,
        } = request;

        let outcome = self
            .mutate(|encounter| {
                if let Some(expected) = expected_version {
                    let current = encounter
                        .token(token)
                        .ok_or(MoveError::TokenNotFound(token))?;
                    if current.version != expected {
                        return Err(RuntimeError::ConcurrentModification {
                            token,
                            expected,
                            actual: current.version,
                        });
                    }
                }

                let plan = encounter.attempt_move(token, to, is_override)?;
                let moved = encounter
                    .token(token)
                    .cloned()
                    .ok_or(MoveError::TokenNotFound(token))?;
                Ok(MoveOutcome {
                    token: moved,
                    budget: plan.actor.map(|_| plan.budget_after),
                    cost: plan.cost,
                    path: plan.path,
                    revision: encounter.revision(),
                })
            })
            .await;

        if let Ok(outcome) = &outcome {
            debug!(
                token = %token,
                cost = %outcome.cost,
                revision = outcome.revision,
                is_override,
                "token moved"
            );
        }
        outcome
    }

    /// Applies `op` to a copy of the encounter, commits the difference and
    /// swaps the copy in. On any error the authoritative encounter is
    /// untouched and nothing is published.
    async fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Encounter) -> Result<T>,
    ) -> Result<T> {
        let mut next = self.encounter.clone();
        let value = op(&mut next)?;

        let notifications = match self.gateway.commit(&self.encounter, &next).await {
            Ok(notifications) => notifications,
            Err(err) => {
                warn!(
                    revision = next.revision(),
                    "commit failed, keeping revision {}: {}",
                    self.encounter.revision(),
                    err
                );
                return Err(RuntimeError::Repository(err));
            }
        };

        self.encounter = next;
        for notification in notifications {
            self.event_bus.publish(notification);
        }
        Ok(value)
    }

    fn roll_initiative(&mut self, participants: Vec<InitiativeParticipant>) -> InitiativeOrder {
        let rolls = participants
            .into_iter()
            .map(|participant| InitiativeRoll {
                entity_id: participant.entity_id,
                kind: participant.kind,
                roll: self.rng.gen_range(1..=20),
                modifier: participant.modifier,
            })
            .collect();
        InitiativeOrder::from_rolls(rolls)
    }
}

/// Rule rejections are routine and logged at debug; internal failures warn.
fn respond<T>(reply: oneshot::Sender<Result<T>>, result: Result<T>, command: &str) {
    if let Err(err) = &result {
        let severity = err.severity();
        if severity.is_internal() {
            warn!(severity = severity.as_str(), reason = %err.kind(), "{} failed: {}", command, err);
        } else {
            debug!(severity = severity.as_str(), reason = %err.kind(), "{} rejected: {}", command, err);
        }
    }
    if reply.send(result).is_err() {
        debug!("{} reply channel closed (caller dropped)", command);
    }
}

fn now() -> Timestamp {
    Timestamp(chrono::Utc::now().timestamp_millis().max(0) as u64)
}
