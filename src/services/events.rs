//! View invalidation events
//!
//! Every successful mutation broadcasts an `InvalidationEvent` naming the
//! user and the view that must be refreshed. Nothing in the core waits on
//! listeners; with no subscribers the event is dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::auth::DASHBOARD_PATH;

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    GoalCreated,
    GoalUpdated,
    GoalArchived,
    GoalDeleted,
    ReflectionRecorded,
    ReflectionUpdated,
    ReflectionDeleted,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::GoalCreated => "goal_created",
            MutationKind::GoalUpdated => "goal_updated",
            MutationKind::GoalArchived => "goal_archived",
            MutationKind::GoalDeleted => "goal_deleted",
            MutationKind::ReflectionRecorded => "reflection_recorded",
            MutationKind::ReflectionUpdated => "reflection_updated",
            MutationKind::ReflectionDeleted => "reflection_deleted",
        }
    }
}

/// A view of `user_id` at `path` is stale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationEvent {
    pub user_id: String,
    pub kind: MutationKind,
    pub path: String,
}

impl InvalidationEvent {
    /// Invalidate the dashboard, the only view that shows journal data
    pub fn dashboard(user_id: &str, kind: MutationKind) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            path: DASHBOARD_PATH.to_string(),
        }
    }
}

/// Event bus for broadcasting invalidation events
pub struct EventBus {
    sender: broadcast::Sender<InvalidationEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: InvalidationEvent) {
        trace!(event = ?event, "Emitting invalidation event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    info!(
                        user_id = %event.user_id,
                        kind = event.kind.as_str(),
                        path = %event.path,
                        "View invalidated"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
