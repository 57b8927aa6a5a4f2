//! Single reconciliation entry point for push and polling paths.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::Result;
use crate::events::{Notification, TopicSubscriptions};

use super::transport::SessionTransport;
use super::view::{RefreshOutcome, SharedView, read_view, write_view};

/// Keeps a shared `LocalView` in step with the host.
///
/// Push notifications and the polling fallback both end in
/// [`Reconciler::refresh`]; nothing else writes authoritative state into the
/// view.
#[derive(Clone)]
pub struct Reconciler<T> {
    transport: T,
    view: SharedView,
    poll_interval: Duration,
}

impl<T: SessionTransport> Reconciler<T> {
    pub fn new(transport: T, view: SharedView, poll_interval: Duration) -> Self {
        Self {
            transport,
            view,
            poll_interval,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    /// Fetches the full authoritative state and adopts it.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let snapshot = self.transport.refresh().await?;
        let outcome = write_view(&self.view).apply_snapshot(snapshot);
        debug!(?outcome, "refreshed local view");
        Ok(outcome)
    }

    /// Reacts to one push notification. Notifications for revisions the view
    /// already holds are skipped; everything else triggers a full refresh.
    pub async fn on_notification(&self, notification: &Notification) -> Result<Option<RefreshOutcome>> {
        let held = read_view(&self.view).revision();
        if !notification.requires_full_refresh()
            && notification.revision().is_some_and(|revision| revision <= held)
        {
            return Ok(None);
        }
        self.refresh().await.map(Some)
    }

    /// Runs until `shutdown` fires. Listens to `push` while it is open; once
    /// it closes, polls every `poll_interval`. A lagged receiver is
    /// reconciled with an immediate refresh.
    pub async fn run(self, push: Option<TopicSubscriptions>, mut shutdown: oneshot::Receiver<()>) {
        let mut push = push;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if push.is_none() {
            info!("no push channel, polling every {:?}", self.poll_interval);
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                received = next_push(&mut push) => match received {
                    Ok(notification) => {
                        if let Err(err) = self.on_notification(&notification).await {
                            warn!("refresh after notification failed: {}", err);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "push channel lagged, refreshing");
                        self.refresh_logged().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("push channel closed, falling back to polling every {:?}", self.poll_interval);
                        push = None;
                        ticker.reset();
                    }
                },
                _ = ticker.tick(), if push.is_none() => {
                    self.refresh_logged().await;
                }
            }
        }
    }

    async fn refresh_logged(&self) {
        if let Err(err) = self.refresh().await {
            warn!(reason = %err.kind(), "refresh failed: {}", err);
        }
    }
}

async fn next_push(push: &mut Option<TopicSubscriptions>) -> std::result::Result<Notification, RecvError> {
    match push {
        Some(subscriptions) => subscriptions.recv().await,
        None => std::future::pending().await,
    }
}
