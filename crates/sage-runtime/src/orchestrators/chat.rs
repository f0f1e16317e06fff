//! Session-based conversational workflow, blocking or streaming.
//!
//! History strategy is exclusive per provider capability: a provider with
//! native threading gets only the new user message plus the stored remote
//! thread id; any other provider gets the recent transcript window replayed
//! explicitly. The streaming subtype buffers the assistant reply and
//! commits the submission only after the stream drains; a mid-stream
//! failure leaves no submission behind.

use std::sync::Arc;

use async_trait::async_trait;
use sage_config::{EffectiveConfig, Scope};
use sage_core::ChatMessage;
use sage_llm::{ChunkStream, ProviderError, StreamChunk};
use sage_store::SessionRow;
use serde_json::Value;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::RunError;
use crate::orchestrators::{
    Orchestrator, completion_params, content_message, processor_prompt,
};
use crate::sessions::SessionManager;
use crate::tasks::read_task_status;
use crate::types::{HistoryPage, RunInput, RunOutcome, RunResult, RunState};

const DEFAULT_PROMPT: &str =
    "You are a helpful course assistant. Answer using the provided course content.";

/// Session-based chat over course content.
#[derive(Clone)]
pub struct ChatOrchestrator {
    scope: Scope,
    config: EffectiveConfig,
    user_id: String,
    ctx: Arc<ExecutionContext>,
    manager: SessionManager,
    streaming: bool,
}

impl ChatOrchestrator {
    /// Build a chat orchestrator; `streaming` picks the output mode.
    pub fn new(
        scope: Scope,
        config: EffectiveConfig,
        user_id: String,
        ctx: Arc<ExecutionContext>,
        streaming: bool,
    ) -> Self {
        let manager = SessionManager::new(
            Arc::clone(&ctx.store),
            ctx.settings.max_context_messages,
        );
        Self {
            scope,
            config,
            user_id,
            ctx,
            manager,
            streaming,
        }
    }

    /// The requesting user.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The scope this run was dispatched under.
    #[must_use]
    pub fn scope_id(&self) -> &str {
        &self.scope.id
    }

    /// The executing profile.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.scope.profile
    }

    fn session(&self) -> Result<SessionRow, RunError> {
        Ok(self
            .manager
            .get_or_create(&self.user_id, &self.scope.id, &self.scope.profile)?)
    }

    /// Assemble the provider call for one turn. Returns the message list
    /// and the params, with the history strategy already applied.
    async fn build_call(
        &self,
        session: &SessionRow,
        input: &RunInput,
        user_message: &ChatMessage,
    ) -> Result<(Vec<ChatMessage>, sage_llm::CompletionParams), RunError> {
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
            ChatMessage::system(processor_prompt(&self.config, "chat", DEFAULT_PROMPT)),
            content_message(&content),
        ];
        let mut params = completion_params(&self.config, "chat");

        if self.ctx.provider.supports_remote_threads() {
            // The provider holds the transcript; never replay it.
            params.remote_thread = session.remote_thread_id.clone();
        } else {
            let history = self.manager.initial_history(session)?;
            messages.extend(history.messages);
        }
        messages.push(user_message.clone());
        Ok((messages, params))
    }

    /// Open a provider-side thread for a session that has none yet: one
    /// prompt-and-content call whose reply is discarded, keeping only the
    /// minted thread id.
    async fn bootstrap_thread(
        &self,
        session: &SessionRow,
        input: &RunInput,
    ) -> Result<(), RunError> {
        let content = self
            .ctx
            .content
            .fetch_content(
                &input.course_id,
                &input.location_id,
                self.ctx.settings.content_char_budget,
            )
            .await?;
        let messages = vec![
            ChatMessage::system(processor_prompt(&self.config, "chat", DEFAULT_PROMPT)),
            content_message(&content),
        ];
        let params = completion_params(&self.config, "chat");
        let completion = self.ctx.provider.complete(&messages, &params).await?;
        if let Some(thread) = &completion.remote_thread_id {
            self.ctx.store.set_remote_thread(&session.id, thread)?;
            debug!(session_id = %session.id, "remote thread bootstrapped");
        }
        Ok(())
    }

    /// Wrap a provider stream so the turn is persisted only once the
    /// stream has fully drained with a terminal chunk.
    fn commit_on_drain(
        &self,
        mut inner: ChunkStream,
        session: SessionRow,
        user_message: ChatMessage,
    ) -> ChunkStream {
        use futures::StreamExt;

        let manager = self.manager.clone();
        let store = Arc::clone(&self.ctx.store);
        Box::pin(async_stream::stream! {
            let mut buffer = String::new();
            let mut pending_done = None;
            while let Some(chunk) = inner.next().await {
                match chunk {
                    Ok(StreamChunk::Delta { text }) => {
                        buffer.push_str(&text);
                        yield Ok(StreamChunk::Delta { text });
                    }
                    Ok(done @ StreamChunk::Done { .. }) => pending_done = Some(done),
                    Err(e) => {
                        // No commit: the partial reply is discarded.
                        yield Err(e);
                        return;
                    }
                }
            }
            let Some(done) = pending_done else {
                yield Err(ProviderError::Stream {
                    message: "stream ended without a terminal chunk".to_string(),
                });
                return;
            };

            let turn = vec![user_message, ChatMessage::assistant(buffer)];
            if let Err(e) = manager.append_turn(&session, turn) {
                yield Err(ProviderError::Other {
                    message: format!("failed to persist turn after stream: {e}"),
                });
                return;
            }
            if let StreamChunk::Done { remote_thread_id: Some(thread), .. } = &done {
                if let Err(e) = store.set_remote_thread(&session.id, thread) {
                    debug!(session_id = %session.id, error = %e, "remote thread update failed");
                }
            }
            yield Ok(done);
        })
    }
}

#[async_trait]
impl Orchestrator for ChatOrchestrator {
    async fn run(&self, input: RunInput) -> Result<RunOutcome, RunError> {
        debug!(state = RunState::Fetching.as_str(), scope_id = %self.scope.id, "chat run");
        let session = self.session()?;

        let Some(text) = input.input.as_deref().filter(|s| !s.trim().is_empty()) else {
            // No-input turn: hand back the recent window so the client can
            // render the existing conversation. First contact with a
            // thread-capable provider also mints the remote thread.
            if self.ctx.provider.supports_remote_threads() && session.remote_thread_id.is_none() {
                self.bootstrap_thread(&session, &input).await?;
            }
            let page = self.manager.initial_history(&session)?;
            return Ok(RunOutcome::Completed(RunResult::history(page)));
        };
        let user_message = ChatMessage::user(text);
        let (messages, params) = self.build_call(&session, &input, &user_message).await?;

        debug!(state = RunState::Processing.as_str(), streaming = self.streaming, "chat model call");
        if self.streaming {
            let stream = self.ctx.provider.stream(&messages, &params).await?;
            return Ok(RunOutcome::Streaming(self.commit_on_drain(
                stream,
                session,
                user_message,
            )));
        }

        let completion = self.ctx.provider.complete(&messages, &params).await?;
        let turn = vec![
            user_message,
            ChatMessage::assistant(completion.text.clone()),
        ];
        let _ = self.manager.append_turn(&session, turn)?;
        if let Some(thread) = &completion.remote_thread_id {
            self.ctx.store.set_remote_thread(&session.id, thread)?;
        }
        Ok(RunOutcome::Completed(RunResult::completed(
            completion.text,
            completion.tokens_used,
            completion.model_used,
        )))
    }

    async fn clear_session(&self) -> Result<(), RunError> {
        if let Some(session) =
            self.manager
                .find(&self.user_id, &self.scope.id, &self.scope.profile)?
        {
            self.manager.clear(&session.id)?;
        }
        Ok(())
    }

    async fn run_status(&self) -> Result<Value, RunError> {
        match self
            .manager
            .find(&self.user_id, &self.scope.id, &self.scope.profile)?
        {
            Some(session) => Ok(read_task_status(&session)),
            None => Ok(serde_json::json!({"runStatus": "idle"})),
        }
    }

    async fn chat_history(&self, already_shown: usize) -> Result<HistoryPage, RunError> {
        let Some(session) = self
            .manager
            .find(&self.user_id, &self.scope.id, &self.scope.profile)?
        else {
            return Ok(HistoryPage {
                messages: Vec::new(),
                has_more: false,
            });
        };
        let page = if already_shown == 0 {
            self.manager.initial_history(&session)?
        } else {
            self.manager.older_messages(&session, already_shown)?
        };
        Ok(page)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
