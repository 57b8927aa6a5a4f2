//! Topic-based event bus for confirmed session changes.
//!
//! Notifications are published to specific topics after a commit succeeds,
//! and consumers subscribe only to the topics they need.

mod bus;
mod types;

pub use bus::{EventBus, Topic, TopicSubscriptions};
pub use types::Notification;
