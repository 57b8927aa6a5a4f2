//! Builds the repository, encounter, and runtime used by host front-ends.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tabletop_runtime::{FileSessionStore, InMemorySessionStore, Runtime, SessionRepository};

use crate::config::HostConfig;
use crate::logging;
use crate::maps;

/// Builder that assembles the session runtime from a [`HostConfig`].
pub struct HostBuilder {
    config: HostConfig,
}

impl HostBuilder {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    /// Directory holding this session's records, when persistence is enabled.
    pub fn session_dir(&self, session_id: &str) -> Option<PathBuf> {
        self.config.enable_persistence.then(|| {
            self.config
                .save_data_dir
                .clone()
                .unwrap_or_else(logging::data_dir)
                .join(session_id)
        })
    }

    pub async fn build(self) -> Result<HostSetup> {
        let session_id = self.config.session_id_or_generate();

        let repository: Arc<dyn SessionRepository> = match self.session_dir(&session_id) {
            Some(dir) => {
                tracing::info!("Persisting session to {}", dir.display());
                Arc::new(FileSessionStore::new(&dir)?)
            }
            None => {
                tracing::info!("Session is kept in memory only");
                Arc::new(InMemorySessionStore::new())
            }
        };

        // A persisted session takes precedence; the map only seeds new ones.
        let encounter = maps::load_encounter(
            self.config.map_path.as_deref(),
            &self.config.runtime.game_config,
        )?;

        let runtime = Runtime::builder()
            .config(self.config.runtime.clone())
            .encounter(encounter)
            .repository(repository)
            .build()
            .await?;

        Ok(HostSetup {
            config: self.config,
            session_id,
            runtime,
        })
    }
}

pub struct HostSetup {
    pub config: HostConfig,
    pub session_id: String,
    pub runtime: Runtime,
}
