//! High-level runtime orchestrator.
//!
//! The runtime owns the session worker, wires up command/event channels, and
//! exposes a builder-based API for hosts to start a session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use tabletop_core::{Encounter, GameConfig};

use crate::api::{Result, RuntimeError, SessionHandle};
use crate::events::EventBus;
use crate::gateway::MutationGateway;
use crate::repository::{InMemorySessionStore, SessionRepository};
use crate::workers::{Command, SessionWorker};

pub const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub game_config: GameConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Upper bound on a request, commit included, as seen by the caller.
    pub commit_timeout: Duration,
    /// Refresh period for participants without a push channel.
    pub poll_interval: Duration,
    /// Fixed seed for initiative rolls; entropy when `None`.
    pub initiative_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            game_config: GameConfig::default(),
            event_buffer_size: 100,
            command_buffer_size: 32,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            initiative_seed: None,
        }
    }
}

/// Main runtime that hosts one session
///
/// Design: Runtime owns the worker and coordinates shutdown.
/// [`SessionHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    handle: SessionHandle,
    config: RuntimeConfig,
    shutdown_tx: oneshot::Sender<()>,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this session
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Stops the worker after the command it is processing, then joins it.
    pub async fn shutdown(self) -> Result<()> {
        if self.shutdown_tx.send(()).is_err() {
            tracing::debug!("session worker already stopped");
        }
        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    encounter: Option<Encounter>,
    repository: Option<Arc<dyn SessionRepository>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            encounter: None,
            repository: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Encounter to start from when the repository holds no session yet
    pub fn encounter(mut self, encounter: Encounter) -> Self {
        self.encounter = Some(encounter);
        self
    }

    /// Session store (default: in-memory)
    pub fn repository(mut self, repository: Arc<dyn SessionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Build the runtime
    ///
    /// A session already persisted in the repository takes precedence over
    /// the supplied encounter.
    pub async fn build(self) -> Result<Runtime> {
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()));
        let gateway = MutationGateway::new(Arc::clone(&repository));

        let encounter = match repository.load().await? {
            Some(stored) => {
                let encounter = stored.into_encounter(&self.config.game_config)?;
                tracing::info!(
                    revision = encounter.revision(),
                    tokens = encounter.map().token_count(),
                    "recovered persisted session"
                );
                encounter
            }
            None => {
                let encounter = self.encounter.ok_or(RuntimeError::MissingEncounter)?;
                gateway.commit_initial(&encounter).await?;
                encounter
            }
        };

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);

        let handle = SessionHandle::new(command_tx, event_bus.clone(), self.config.commit_timeout);

        let worker = SessionWorker::new(
            encounter,
            gateway,
            command_rx,
            shutdown_rx,
            event_bus,
            self.config.initiative_seed,
        );
        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(Runtime {
            handle,
            config: self.config,
            shutdown_tx,
            worker_handle,
        })
    }
}
