//! Shared execution context handed to orchestrator factories.
//!
//! Collaborators are injected here once at startup; orchestrators never
//! construct their own providers, stores, or queues.

use std::sync::Arc;
use std::time::Duration;

use sage_core::{ContentProvider, EventEmitter};
use sage_llm::CompletionProvider;
use sage_store::SubmissionStore;

use crate::tasks::TaskQueue;

/// Tunables that apply to every run.
#[derive(Clone, Debug)]
pub struct RuntimeSettings {
    /// Window size for history pagination and explicit history replay.
    pub max_context_messages: usize,
    /// Character budget passed to the content provider, when set.
    pub content_char_budget: Option<usize>,
    /// Wall-clock deadline for async tasks.
    pub task_deadline: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_context_messages: 20,
            content_char_budget: Some(16_000),
            task_deadline: Duration::from_secs(120),
        }
    }
}

/// Everything an orchestrator needs beyond its own configuration.
pub struct ExecutionContext {
    /// Course content collaborator.
    pub content: Arc<dyn ContentProvider>,
    /// Model-call collaborator.
    pub provider: Arc<dyn CompletionProvider>,
    /// Session and submission persistence.
    pub store: Arc<dyn SubmissionStore>,
    /// Background task queue.
    pub queue: Arc<dyn TaskQueue>,
    /// Workflow event emitter.
    pub emitter: Arc<EventEmitter>,
    /// Engine tunables.
    pub settings: RuntimeSettings,
}

impl ExecutionContext {
    /// Assemble a context from its collaborators.
    pub fn new(
        content: Arc<dyn ContentProvider>,
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn SubmissionStore>,
        queue: Arc<dyn TaskQueue>,
        emitter: Arc<EventEmitter>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            content,
            provider,
            store,
            queue,
            emitter,
            settings,
        }
    }
}
