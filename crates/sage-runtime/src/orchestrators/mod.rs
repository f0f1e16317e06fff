//! Orchestrator classes: the per-workflow execution strategies.
//!
//! | Class            | Session | Output     |
//! |------------------|---------|------------|
//! | `summary`        | no      | blocking   |
//! | `stream_summary` | no      | streaming  |
//! | `chat`           | yes     | blocking or streaming |
//! | `async_chat`     | yes     | deferred (task queue) |
//!
//! An orchestrator instance is built per run by its registry factory and
//! sees only its scope, effective configuration, requesting user, and the
//! shared [`crate::context::ExecutionContext`].

use async_trait::async_trait;
use futures::StreamExt;
use sage_config::EffectiveConfig;
use sage_core::{ChatMessage, StructuredContent};
use sage_llm::{ChunkStream, CompletionParams, ProviderError, StreamChunk};
use serde_json::Value;

use crate::errors::RunError;
use crate::types::{HistoryPage, RunInput, RunOutcome};

mod async_chat;
mod chat;
mod summary;

pub use async_chat::AsyncChatOrchestrator;
pub use chat::ChatOrchestrator;
pub use summary::SummaryOrchestrator;

/// One workflow execution strategy.
///
/// `run` is the primary action; the session auxiliaries default to
/// unsupported so stateless classes reject them without boilerplate.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Execute the workflow's primary action.
    async fn run(&self, input: RunInput) -> Result<RunOutcome, RunError>;

    /// Drop the session and its transcript.
    async fn clear_session(&self) -> Result<(), RunError> {
        Err(RunError::UnsupportedAction("clear_session".into()))
    }

    /// Read async run status from session metadata.
    async fn run_status(&self) -> Result<Value, RunError> {
        Err(RunError::UnsupportedAction("run_status".into()))
    }

    /// Page back through persisted history.
    async fn chat_history(&self, _already_shown: usize) -> Result<HistoryPage, RunError> {
        Err(RunError::UnsupportedAction("chat_history".into()))
    }
}

/// Model-call parameters declared in a processor block.
pub(crate) fn completion_params(config: &EffectiveConfig, processor: &str) -> CompletionParams {
    let Some(block) = config.processor(processor) else {
        return CompletionParams::default();
    };
    CompletionParams {
        model: block.get("model").and_then(Value::as_str).map(String::from),
        temperature: block.get("temperature").and_then(Value::as_f64),
        max_tokens: block
            .get("max_tokens")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        remote_thread: None,
    }
}

/// The prompt declared in a processor block, or the class default.
pub(crate) fn processor_prompt(
    config: &EffectiveConfig,
    processor: &str,
    default: &str,
) -> String {
    config
        .processor(processor)
        .and_then(|block| block.get("prompt"))
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Course content rendered as a system context message.
pub(crate) fn content_message(content: &StructuredContent) -> ChatMessage {
    let body = serde_json::to_string(content)
        .unwrap_or_else(|_| content.display_name.clone());
    ChatMessage::system(format!("Course content for this unit:\n{body}"))
}

/// Forward a chunk stream, holding the terminal `Done` chunk back until the
/// upstream source is exhausted. A source that errs, or ends without a
/// `Done`, never produces one.
pub(crate) fn done_after_exhaustion(mut inner: ChunkStream) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut pending_done = None;
        while let Some(chunk) = inner.next().await {
            match chunk {
                Ok(done @ StreamChunk::Done { .. }) => pending_done = Some(done),
                Ok(delta) => yield Ok(delta),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        match pending_done {
            Some(done) => yield Ok(done),
            None => yield Err(ProviderError::Stream {
                message: "stream ended without a terminal chunk".to_string(),
            }),
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
