//! Event bus: a process-wide, append-only log of workflow
//! events with a broadcast channel for subscribers, matching the Rust-native
//! "bounded channel of events" control-flow idiom rather than the hand-rolled
//! callback list of the original per-workflow emitter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex};

/// Event type constants, grouped the way the original emitter groups them:
/// workflow/step/llm/tool lifecycle plus two cross-cutting notifications.
pub mod event_types {
    pub const WORKFLOW_START: &str = "workflow_start";
    pub const WORKFLOW_COMPLETE: &str = "workflow_complete";
    pub const WORKFLOW_ERROR: &str = "workflow_error";

    pub const STEP_START: &str = "step_start";
    pub const STEP_COMPLETE: &str = "step_complete";
    pub const STEP_ERROR: &str = "step_error";

    pub const LLM_START: &str = "llm_start";
    pub const LLM_COMPLETE: &str = "llm_complete";
    pub const LLM_ERROR: &str = "llm_error";

    pub const TOOL_START: &str = "tool_start";
    pub const TOOL_COMPLETE: &str = "tool_complete";
    pub const TOOL_ERROR: &str = "tool_error";

    pub const MESSAGE_ADDED: &str = "message_added";
    pub const PROGRESS_UPDATE: &str = "progress_update";
}

/// One entry in the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Unix timestamp in seconds, used for `events_since`/`prune` ordering.
    pub timestamp: f64,
    pub event_type: String,
    pub workflow_id: String,
    pub step_id: String,
    pub data: HashMap<String, serde_json::Value>,
    pub user_request_id: Option<String>,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Process-wide event log plus a broadcast channel subscribers drain from.
/// The history mutex guards only the `Vec<Event>`; the broadcast sender is
/// lock-free to publish on, so a slow subscriber never blocks `emit`.
#[derive(Debug)]
pub struct EventBus {
    history: Mutex<Vec<Event>>,
    sender: broadcast::Sender<Event>,
}

/// Default capacity for the underlying broadcast channel. A subscriber that
/// falls more than this many events behind drops the oldest unread ones
/// (`RecvError::Lagged`) rather than the bus blocking producers.
const CHANNEL_CAPACITY: usize = 1024;

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            history: Mutex::new(Vec::new()),
            sender,
        }
    }

    /// Append an event to the log and publish it to every live subscriber.
    /// A `SendError` (no subscribers currently listening) is not a failure.
    pub async fn emit(
        &self,
        event_type: impl Into<String>,
        workflow_id: impl Into<String>,
        step_id: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
        user_request_id: Option<String>,
    ) -> Event {
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now_secs(),
            event_type: event_type.into(),
            workflow_id: workflow_id.into(),
            step_id: step_id.into(),
            data,
            user_request_id,
        };

        self.history.lock().await.push(event.clone());
        let _ = self.sender.send(event.clone());
        log::debug!("workflow event emitted: {}", event.event_type);
        event
    }

    /// Register a new listener. Dropping the returned receiver is the
    /// "unsubscribe" — there is no separate unregister call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub async fn events_since(&self, timestamp: f64) -> Vec<Event> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|e| e.timestamp > timestamp)
            .cloned()
            .collect()
    }

    pub async fn events_for(&self, workflow_id: &str) -> Vec<Event> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// Drop events older than `max_age_seconds`.
    pub async fn prune(&self, max_age_seconds: f64) {
        let cutoff = now_secs() - max_age_seconds;
        self.history.lock().await.retain(|e| e.timestamp > cutoff);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_appends_to_history_and_is_filterable_by_workflow() {
        let bus = EventBus::new();
        bus.emit(event_types::WORKFLOW_START, "wf1", "step1", HashMap::new(), None)
            .await;
        bus.emit(event_types::WORKFLOW_START, "wf2", "step1", HashMap::new(), None)
            .await;

        let wf1_events = bus.events_for("wf1").await;
        assert_eq!(wf1_events.len(), 1);
        assert_eq!(wf1_events[0].workflow_id, "wf1");
    }

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        bus.emit(event_types::TOOL_START, "wf1", "step1", HashMap::new(), None)
            .await;
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_type, event_types::TOOL_START);
    }

    #[tokio::test]
    async fn events_since_excludes_events_at_or_before_the_cutoff() {
        let bus = EventBus::new();
        let first = bus
            .emit(event_types::STEP_START, "wf1", "step1", HashMap::new(), None)
            .await;
        bus.emit(event_types::STEP_COMPLETE, "wf1", "step1", HashMap::new(), None)
            .await;

        let since = bus.events_since(first.timestamp).await;
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].event_type, event_types::STEP_COMPLETE);
    }

    #[tokio::test]
    async fn prune_drops_events_older_than_max_age() {
        let bus = EventBus::new();
        bus.emit(event_types::WORKFLOW_START, "wf1", "step1", HashMap::new(), None)
            .await;
        bus.prune(-1.0).await;
        assert!(bus.events_for("wf1").await.is_empty());
    }
}
