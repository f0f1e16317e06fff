//! Session-based deferred chat: the turn runs on the task queue.
//!
//! `run` acknowledges immediately with `processing` and a task id; the
//! result, failure, or timeout lands only in the session metadata map,
//! read back through `run_status`.

use std::sync::Arc;

use async_trait::async_trait;
use sage_config::{EffectiveConfig, Scope};
use serde_json::Value;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::RunError;
use crate::orchestrators::{ChatOrchestrator, Orchestrator};
use crate::types::{HistoryPage, RunInput, RunOutcome, RunResult};

/// Deferred chat over the task queue. Session auxiliaries delegate to the
/// underlying chat behavior.
pub struct AsyncChatOrchestrator {
    inner: ChatOrchestrator,
    ctx: Arc<ExecutionContext>,
}

impl AsyncChatOrchestrator {
    /// Build a deferred chat orchestrator.
    pub fn new(
        scope: Scope,
        config: EffectiveConfig,
        user_id: String,
        ctx: Arc<ExecutionContext>,
    ) -> Self {
        let inner = ChatOrchestrator::new(scope, config, user_id, Arc::clone(&ctx), false);
        Self { inner, ctx }
    }
}

#[async_trait]
impl Orchestrator for AsyncChatOrchestrator {
    async fn run(&self, input: RunInput) -> Result<RunOutcome, RunError> {
        // No-input turns need no queue round trip.
        if input.input.as_deref().is_none_or(|s| s.trim().is_empty()) {
            return self.inner.run(input).await;
        }

        let session = self.ctx.store.get_or_create_session(
            self.inner.user_id(),
            self.inner.scope_id(),
            self.inner.profile(),
        )?;

        let turn = self.inner.clone();
        let work = Box::pin(async move {
            match turn.run(input).await {
                Ok(RunOutcome::Completed(result)) => {
                    serde_json::to_value(&result).map_err(|e| e.to_string())
                }
                Ok(RunOutcome::Streaming(_)) => {
                    Err("deferred workflow produced a stream".to_string())
                }
                Ok(RunOutcome::Failed(failure)) => Err(failure.error),
                Err(e) => Err(e.to_string()),
            }
        });
        let task_id = self.ctx.queue.enqueue(&session.id, "chat", work);
        debug!(session_id = %session.id, task_id = %task_id, "deferred chat enqueued");
        Ok(RunOutcome::Completed(RunResult::processing(task_id)))
    }

    async fn clear_session(&self) -> Result<(), RunError> {
        self.inner.clear_session().await
    }

    async fn run_status(&self) -> Result<Value, RunError> {
        self.inner.run_status().await
    }

    async fn chat_history(&self, already_shown: usize) -> Result<HistoryPage, RunError> {
        self.inner.chat_history(already_shown).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
