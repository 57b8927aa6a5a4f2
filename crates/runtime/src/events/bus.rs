//! Topic-based event bus implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::types::Notification;

/// Topics for notification routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Token placement, movement and removal
    Token,
    /// Active turn and pause stack changes
    Turn,
    /// Movement budget changes
    Budget,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Token, Topic::Turn, Topic::Budget];
}

struct Channels {
    token: broadcast::Sender<Notification>,
    turn: broadcast::Sender<Notification>,
    budget: broadcast::Sender<Notification>,
}

impl Channels {
    fn sender(&self, topic: Topic) -> &broadcast::Sender<Notification> {
        match topic {
            Topic::Token => &self.token,
            Topic::Turn => &self.turn,
            Topic::Budget => &self.budget,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// notifications they care about. Delivery is best-effort: slow subscribers
/// observe `Lagged` and are expected to reconcile through a full refresh.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Channels {
                token: broadcast::channel(capacity).0,
                turn: broadcast::channel(capacity).0,
                budget: broadcast::channel(capacity).0,
            }),
        }
    }

    /// Publish a notification to its topic
    pub fn publish(&self, notification: Notification) {
        let topic = notification.topic();
        if self.channels.sender(topic).send(notification).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Notification> {
        self.channels.sender(topic).subscribe()
    }

    /// Subscribe to every topic through one merged receiver
    pub fn subscribe_all(&self) -> TopicSubscriptions {
        TopicSubscriptions {
            token: self.subscribe(Topic::Token),
            turn: self.subscribe(Topic::Turn),
            budget: self.subscribe(Topic::Budget),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receivers for all topics, polled together.
pub struct TopicSubscriptions {
    token: broadcast::Receiver<Notification>,
    turn: broadcast::Receiver<Notification>,
    budget: broadcast::Receiver<Notification>,
}

impl TopicSubscriptions {
    /// Next notification from whichever topic delivers first.
    ///
    /// Cancel safe. Ordering across topics is not guaranteed.
    pub async fn recv(&mut self) -> Result<Notification, RecvError> {
        tokio::select! {
            received = self.token.recv() => received,
            received = self.turn.recv() => received,
            received = self.budget.recv() => received,
        }
    }
}
