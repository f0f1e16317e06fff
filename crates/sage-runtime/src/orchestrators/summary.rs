//! Stateless single-shot and streaming content summarization.

use std::sync::Arc;

use async_trait::async_trait;
use sage_config::EffectiveConfig;
use sage_core::ChatMessage;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::RunError;
use crate::orchestrators::{
    Orchestrator, completion_params, content_message, done_after_exhaustion, processor_prompt,
};
use crate::types::{RunInput, RunOutcome, RunResult, RunState};

const DEFAULT_PROMPT: &str =
    "Summarize the following course content for a learner. Be concise and accurate.";

/// Fetches the unit's content and produces one summary, either as a full
/// reply or as a chunk stream. No session is involved.
pub struct SummaryOrchestrator {
    config: EffectiveConfig,
    ctx: Arc<ExecutionContext>,
    streaming: bool,
}

impl SummaryOrchestrator {
    /// Blocking variant (`summary`).
    pub fn new(config: EffectiveConfig, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            config,
            ctx,
            streaming: false,
        }
    }

    /// Streaming variant (`stream_summary`).
    pub fn streaming(config: EffectiveConfig, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            config,
            ctx,
            streaming: true,
        }
    }
}

#[async_trait]
impl Orchestrator for SummaryOrchestrator {
    async fn run(&self, input: RunInput) -> Result<RunOutcome, RunError> {
        debug!(state = RunState::Fetching.as_str(), course_id = %input.course_id, location_id = %input.location_id, "summary run");
        let content = self
            .ctx
            .content
            .fetch_content(
                &input.course_id,
                &input.location_id,
                self.ctx.settings.content_char_budget,
            )
            .await?;

        let mut messages = vec![
            ChatMessage::system(processor_prompt(&self.config, "summary", DEFAULT_PROMPT)),
            content_message(&content),
        ];
        if let Some(text) = input.input.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage::user(text));
        } else {
            messages.push(ChatMessage::user("Summarize this content."));
        }
        let params = completion_params(&self.config, "summary");

        debug!(state = RunState::Processing.as_str(), streaming = self.streaming, "summary model call");
        if self.streaming {
            let stream = self.ctx.provider.stream(&messages, &params).await?;
            return Ok(RunOutcome::Streaming(done_after_exhaustion(stream)));
        }

        let completion = self.ctx.provider.complete(&messages, &params).await?;
        if completion.text.trim().is_empty() {
            return Err(RunError::Internal("model produced an empty summary".into()));
        }
        Ok(RunOutcome::Completed(RunResult::completed(
            completion.text,
            completion.tokens_used,
            completion.model_used,
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
