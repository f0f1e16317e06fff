//! Background task execution for session-based async workflows.
//!
//! Status and the final payload live only in the session metadata map:
//! a task writes `processing` before the work starts, then exactly one of
//! `completed`, `error`, or `timeout` when it finishes. The metadata map is
//! replaced as a whole on every write (last writer wins; one writer per
//! session is assumed).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use sage_store::{SessionRow, SubmissionStore};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, warn};
use uuid::Uuid;

/// Metadata key holding the [`TaskStatus`] label.
pub const RUN_STATUS_KEY: &str = "runStatus";
/// Metadata key holding the task id of the most recent enqueue.
pub const TASK_ID_KEY: &str = "taskId";
/// Metadata key holding the final result payload.
pub const RESULT_KEY: &str = "result";
/// Metadata key holding the failure description.
pub const ERROR_KEY: &str = "error";

/// Lifecycle status of an enqueued task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Enqueued or running.
    Processing,
    /// Finished; `result` holds the payload.
    Completed,
    /// Failed; `error` holds the description.
    Error,
    /// Forcibly stopped at the wall-clock deadline.
    Timeout,
}

impl TaskStatus {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// The work a task performs: a future resolving to the result payload or a
/// failure description.
pub type TaskWork = Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>;

/// Background task queue contract. At-most-once dispatch; the queue owns
/// the hard deadline.
pub trait TaskQueue: Send + Sync {
    /// Enqueue work for a session. Returns the task id; the `processing`
    /// status is recorded before this returns.
    fn enqueue(&self, session_id: &str, action: &str, work: TaskWork) -> String;
}

/// Tokio-backed queue: one spawned task per enqueue, wall-clock deadline
/// enforced with `tokio::time::timeout`. Hitting the deadline drops the
/// work future, so the task is forcibly stopped, not merely flagged.
pub struct TokioTaskQueue {
    store: Arc<dyn SubmissionStore>,
    deadline: Duration,
}

impl TokioTaskQueue {
    /// Create a queue writing status through the given store.
    pub fn new(store: Arc<dyn SubmissionStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }
}

impl TaskQueue for TokioTaskQueue {
    fn enqueue(&self, session_id: &str, action: &str, work: TaskWork) -> String {
        let task_id = Uuid::now_v7().to_string();
        write_task_status(
            &*self.store,
            session_id,
            &task_id,
            TaskStatus::Processing,
            None,
            None,
        );

        let store = Arc::clone(&self.store);
        let deadline = self.deadline;
        let session_id = session_id.to_string();
        let action = action.to_string();
        let tid = task_id.clone();
        drop(tokio::spawn(async move {
            match tokio::time::timeout(deadline, work).await {
                Ok(Ok(result)) => {
                    write_task_status(
                        &*store,
                        &session_id,
                        &tid,
                        TaskStatus::Completed,
                        Some(result),
                        None,
                    );
                }
                Ok(Err(message)) => {
                    warn!(session_id = %session_id, action = %action, error = %message, "async task failed");
                    write_task_status(
                        &*store,
                        &session_id,
                        &tid,
                        TaskStatus::Error,
                        None,
                        Some(message),
                    );
                }
                Err(_) => {
                    warn!(session_id = %session_id, action = %action, deadline_s = deadline.as_secs(), "async task hit deadline");
                    write_task_status(
                        &*store,
                        &session_id,
                        &tid,
                        TaskStatus::Timeout,
                        None,
                        Some(format!("task exceeded {}s deadline", deadline.as_secs())),
                    );
                }
            }
        }));
        task_id
    }
}

/// Write a task status into the session metadata map. Best-effort: a store
/// failure is logged, never propagated, since status is a side channel.
pub fn write_task_status(
    store: &dyn SubmissionStore,
    session_id: &str,
    task_id: &str,
    status: TaskStatus,
    result: Option<Value>,
    error_message: Option<String>,
) {
    let write = || -> sage_store::Result<()> {
        let session = store.get_session(session_id)?;
        let mut metadata = match session.metadata {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let _ = metadata.insert(RUN_STATUS_KEY.into(), json!(status.as_str()));
        let _ = metadata.insert(TASK_ID_KEY.into(), json!(task_id));
        match result {
            Some(payload) => {
                let _ = metadata.insert(RESULT_KEY.into(), payload);
            }
            None => {
                let _ = metadata.remove(RESULT_KEY);
            }
        }
        match error_message {
            Some(message) => {
                let _ = metadata.insert(ERROR_KEY.into(), json!(message));
            }
            None => {
                let _ = metadata.remove(ERROR_KEY);
            }
        }
        store.update_metadata(session_id, &Value::Object(metadata))
    };
    if let Err(e) = write() {
        error!(session_id = %session_id, task_id = %task_id, error = %e, "task status write failed");
    }
}

/// Read the status view for a session, as returned by `run_status`.
#[must_use]
pub fn read_task_status(session: &SessionRow) -> Value {
    let status = session
        .metadata
        .get(RUN_STATUS_KEY)
        .and_then(Value::as_str)
        .unwrap_or("idle");
    let mut view = json!({ RUN_STATUS_KEY: status });
    for key in [TASK_ID_KEY, RESULT_KEY, ERROR_KEY] {
        if let Some(value) = session.metadata.get(key) {
            view[key] = value.clone();
        }
    }
    view
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
