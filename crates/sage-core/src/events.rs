//! Workflow telemetry events and the broadcast-based emitter.
//!
//! Emission is fire-and-forget: `emit` never awaits, never blocks, and never
//! fails the caller's request. Slow receivers lag and drop rather than
//! applying backpressure to the engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// One workflow telemetry event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    /// Event name, dot-separated ("workflow.resolved", "run.completed", ...).
    pub name: String,
    /// Stable id of the run or resolution this event belongs to.
    pub workflow_id: String,
    /// Requested action ("summarize", "chat", ...).
    pub action: String,
    /// Course the request targeted.
    pub course_id: String,
    /// Profile selected by scope resolution, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    /// Location the request targeted.
    pub location_id: String,
}

impl WorkflowEvent {
    /// Build an event.
    pub fn new(
        name: impl Into<String>,
        workflow_id: impl Into<String>,
        action: impl Into<String>,
        course_id: impl Into<String>,
        location_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            workflow_id: workflow_id.into(),
            action: action.into(),
            course_id: course_id.into(),
            profile_name: None,
            location_id: location_id.into(),
        }
    }

    /// Attach the resolved profile name.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile_name = Some(profile.into());
        self
    }
}

/// Fire-and-forget event sink.
pub trait EventSink: Send + Sync {
    /// Emit one event. Must never block or fail the caller's request.
    fn emit(&self, event: WorkflowEvent);
}

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers will be dropped
/// (lagged) rather than blocking the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<WorkflowEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Subscribe to events. Returns a receiver that will receive all events
    /// emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl EventSink for EventEmitter {
    fn emit(&self, event: WorkflowEvent) {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        // send() errs when there are no receivers; that is fine.
        if self.tx.send(event).is_err() {
            tracing::trace!("workflow event emitted with no subscribers");
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved_event() -> WorkflowEvent {
        WorkflowEvent::new("workflow.resolved", "wf-1", "summarize", "course-1", "unit-1")
            .with_profile("default")
    }

    #[test]
    fn emit_with_no_subscribers_does_not_fail() {
        let emitter = EventEmitter::new();
        emitter.emit(resolved_event());
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn emit_and_receive() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        emitter.emit(resolved_event());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name, "workflow.resolved");
        assert_eq!(received.profile_name.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let emitter = EventEmitter::new();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);

        emitter.emit(resolved_event());

        assert_eq!(rx1.recv().await.unwrap().workflow_id, "wf-1");
        assert_eq!(rx2.recv().await.unwrap().workflow_id, "wf-1");
    }
}
