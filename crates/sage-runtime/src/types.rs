//! Request and outcome types crossing the dispatcher boundary.

use sage_core::{ActionFailure, ChatMessage};
use sage_llm::ChunkStream;
use serde::Serialize;
use serde_json::Value;

/// Diagnostic lifecycle state of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Resolving configuration and fetching collaborator inputs.
    Fetching,
    /// Model call in flight.
    Processing,
    /// Finished with a full result.
    Completed,
    /// Handed off as an incremental stream.
    Streaming,
    /// Finished with a structured failure.
    Failed,
}

impl RunState {
    /// Lowercase label for logging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Streaming => "streaming",
            Self::Failed => "failed",
        }
    }
}

/// The action a request asks a workflow to perform.
///
/// The primary action name ("summarize", "chat", ...) is free-form and
/// routes to [`crate::orchestrators::Orchestrator::run`]; the session
/// auxiliaries are a closed set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// The workflow's primary action.
    Run,
    /// Drop the session and its transcript.
    ClearSession,
    /// Read async run status from session metadata.
    RunStatus,
    /// Page back through persisted history.
    ChatHistory {
        /// Messages the caller has already rendered, counted from the end.
        already_shown: usize,
    },
}

impl Action {
    /// Classify a request's action name. Unrecognized names are the
    /// workflow's primary action.
    #[must_use]
    pub fn classify(name: &str, params: &Value) -> Self {
        match name {
            "clear_session" => Self::ClearSession,
            "run_status" => Self::RunStatus,
            "chat_history" => Self::ChatHistory {
                already_shown: params
                    .get("alreadyShown")
                    .and_then(Value::as_u64)
                    .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX)),
            },
            _ => Self::Run,
        }
    }
}

/// Inputs handed to an orchestrator's primary action.
#[derive(Clone, Debug)]
pub struct RunInput {
    /// Course the request targets.
    pub course_id: String,
    /// Location the request targets.
    pub location_id: String,
    /// Free-text user input, absent on no-input first turns.
    pub input: Option<String>,
    /// Caller-supplied parameter object.
    pub params: Value,
}

/// One page of persisted history.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Messages in chronological order.
    pub messages: Vec<ChatMessage>,
    /// Whether older messages exist beyond this page.
    pub has_more: bool,
}

/// Status label carried by a completed (non-streaming) outcome.
pub mod result_status {
    /// The run produced its full result.
    pub const COMPLETED: &str = "completed";
    /// The run was enqueued; poll `run_status` for the result.
    pub const PROCESSING: &str = "processing";
    /// The session was cleared.
    pub const CLEARED: &str = "cleared";
}

/// Full result of a non-streaming run.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// One of the [`result_status`] labels.
    pub status: String,
    /// Reply text, for completed model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Tokens consumed by the model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// Model that produced the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// Task id, for async enqueues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// History page, for history reads and no-input chat turns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryPage>,
    /// Raw status view, for `run_status` reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_status: Option<Value>,
}

impl RunResult {
    /// A completed model call.
    #[must_use]
    pub fn completed(response: String, tokens_used: u64, model_used: String) -> Self {
        Self {
            status: result_status::COMPLETED.to_string(),
            response: Some(response),
            tokens_used: Some(tokens_used),
            model_used: Some(model_used),
            ..Self::default()
        }
    }

    /// An async enqueue acknowledgement.
    #[must_use]
    pub fn processing(task_id: String) -> Self {
        Self {
            status: result_status::PROCESSING.to_string(),
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    /// A session-cleared acknowledgement.
    #[must_use]
    pub fn cleared() -> Self {
        Self {
            status: result_status::CLEARED.to_string(),
            ..Self::default()
        }
    }

    /// A history page.
    #[must_use]
    pub fn history(page: HistoryPage) -> Self {
        Self {
            status: result_status::COMPLETED.to_string(),
            history: Some(page),
            ..Self::default()
        }
    }

    /// A status view read from session metadata.
    #[must_use]
    pub fn run_status(view: Value) -> Self {
        Self {
            status: result_status::COMPLETED.to_string(),
            run_status: Some(view),
            ..Self::default()
        }
    }
}

/// Discriminated outcome of one dispatched run.
pub enum RunOutcome {
    /// Full result available now.
    Completed(RunResult),
    /// Incremental output; consume the stream to completion.
    Streaming(ChunkStream),
    /// Structured failure.
    Failed(ActionFailure),
}

impl RunOutcome {
    /// The result, if this outcome completed.
    #[must_use]
    pub fn as_completed(&self) -> Option<&RunResult> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// The failure, if this outcome failed.
    #[must_use]
    pub fn as_failed(&self) -> Option<&ActionFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Terminal state label, for logging and events.
    #[must_use]
    pub fn state(&self) -> RunState {
        match self {
            Self::Completed(_) => RunState::Completed,
            Self::Streaming(_) => RunState::Streaming,
            Self::Failed(_) => RunState::Failed,
        }
    }
}

impl std::fmt::Debug for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed(result) => f.debug_tuple("Completed").field(result).finish(),
            Self::Streaming(_) => f.debug_tuple("Streaming").field(&"<stream>").finish(),
            Self::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
