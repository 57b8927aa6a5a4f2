//! Headless session host.
//!
//! ```text
//! Host
//!   └─→ Runtime (authoritative session worker, repository, event bus)
//! ```
//!
//! The host owns the runtime for the lifetime of the process and mirrors bus
//! traffic into the log. Participants connect through [`SessionHandle`]s.

use std::future::Future;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use tabletop_runtime::{Notification, Runtime, SessionHandle};

pub struct Host {
    runtime: Runtime,
}

impl Host {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn handle(&self) -> SessionHandle {
        self.runtime.handle()
    }

    /// Logs notifications until `shutdown` resolves, then stops the worker.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut notifications = self.runtime.handle().subscribe_all();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                received = notifications.recv() => match received {
                    Ok(notification) => log_notification(&notification),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification log fell behind");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.runtime.shutdown().await?;
        tracing::info!("Session worker stopped");
        Ok(())
    }
}

fn log_notification(notification: &Notification) {
    match notification.to_json() {
        Ok(payload) => tracing::debug!(
            topic = ?notification.topic(),
            revision = ?notification.revision(),
            "{}",
            payload
        ),
        Err(e) => tracing::warn!("Failed to encode notification: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabletop_core::{
        Encounter, GameConfig, GridMap, MapDimensions, Position, TerrainCell, TerrainKind, Token,
        TokenId, TokenKind,
    };
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn host_stops_on_request() {
        let map = GridMap::filled(MapDimensions::new(3, 3), TerrainCell::new(TerrainKind::Road))
            .unwrap();
        let runtime = Runtime::builder()
            .encounter(Encounter::new(map, &GameConfig::default()))
            .build()
            .await
            .unwrap();
        let host = Host::new(runtime);
        let handle = host.handle();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = tokio::spawn(host.run_until(async {
            let _ = stop_rx.await;
        }));

        handle
            .place_token(Token::new(TokenId(1), TokenKind::Object, Position::new(1, 1)))
            .await
            .unwrap();
        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        assert!(handle.refresh().await.is_err());
    }
}
