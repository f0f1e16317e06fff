//! The dispatch state machine: request → scope → profile → effective
//! configuration → orchestrator → outcome.
//!
//! Every failure on this path converges to `RunOutcome::Failed` with the
//! stable `{status, error}` shape; `dispatch` itself never errs. One run at
//! a time is allowed per (user, scope, profile) key; for streaming outcomes
//! the slot stays held until the returned stream is drained or dropped.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use sage_config::{
    ConfigResolver, ResolveError, ServiceVariant, WorkflowCatalog, match_scope,
};
use sage_core::{EventSink, WorkflowEvent};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::errors::RunError;
use crate::registry::{OrchestratorRegistry, OrchestratorSeed};
use crate::types::{Action, RunInput, RunOutcome, RunResult, RunState};

/// One caller request, as it arrives at the engine boundary.
#[derive(Clone, Debug)]
pub struct DispatchRequest {
    /// Requesting user.
    pub user_id: String,
    /// Deployment variant the request came from.
    pub service_variant: ServiceVariant,
    /// Course the request targets.
    pub course_id: String,
    /// Location the request targets.
    pub location_id: String,
    /// Action name ("summarize", "chat", "clear_session", ...).
    pub action: String,
    /// Free-text user input.
    pub input: Option<String>,
    /// Caller-supplied parameter object.
    pub params: Value,
}

/// Routes requests to orchestrators and normalizes their outcomes.
pub struct Dispatcher {
    catalog: WorkflowCatalog,
    resolver: ConfigResolver,
    registry: OrchestratorRegistry,
    ctx: Arc<ExecutionContext>,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Dispatcher {
    /// Assemble a dispatcher.
    pub fn new(
        catalog: WorkflowCatalog,
        resolver: ConfigResolver,
        registry: OrchestratorRegistry,
        ctx: Arc<ExecutionContext>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            registry,
            ctx,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Dispatch one request. Infallible at the signature level: failures
    /// come back as `RunOutcome::Failed`.
    #[instrument(skip(self, request), fields(user = %request.user_id, action = %request.action, course = %request.course_id))]
    pub async fn dispatch(&self, request: DispatchRequest) -> RunOutcome {
        let workflow_id = Uuid::now_v7().to_string();
        match self.dispatch_inner(&workflow_id, &request).await {
            Ok(outcome) => {
                let state = outcome.state();
                counter!("sage_runs_total", "outcome" => state.as_str()).increment(1);
                self.emit(&request, &workflow_id, &format!("run.{}", state.as_str()), None);
                outcome
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "run failed");
                counter!("sage_runs_total", "outcome" => RunState::Failed.as_str()).increment(1);
                counter!("sage_run_errors_total", "category" => e.category()).increment(1);
                self.emit(&request, &workflow_id, "run.failed", None);
                RunOutcome::Failed(e.to_failure())
            }
        }
    }

    async fn dispatch_inner(
        &self,
        workflow_id: &str,
        request: &DispatchRequest,
    ) -> Result<RunOutcome, RunError> {
        debug!(state = RunState::Fetching.as_str(), "resolving workflow");
        let scope = match_scope(
            self.catalog.scopes(),
            request.service_variant,
            &request.course_id,
            &request.location_id,
        )
        .ok_or_else(|| ResolveError::ScopeNotFound {
            course_id: request.course_id.clone(),
            location_id: request.location_id.clone(),
        })?
        .clone();
        let profile = self
            .catalog
            .profile(&scope.profile)
            .ok_or_else(|| ResolveError::ProfileNotFound(scope.profile.clone()))?;
        let config = self.resolver.resolve_effective(profile)?;
        self.emit(
            request,
            workflow_id,
            "workflow.resolved",
            Some(&scope.profile),
        );

        let factory = self.registry.resolve(config.orchestrator_class())?;
        let orchestrator = factory(OrchestratorSeed {
            scope: scope.clone(),
            config,
            user_id: request.user_id.clone(),
            ctx: Arc::clone(&self.ctx),
        });

        match Action::classify(&request.action, &request.params) {
            Action::Run => {
                let guard = self.acquire(&request.user_id, &scope.id, &scope.profile)?;
                let input = RunInput {
                    course_id: request.course_id.clone(),
                    location_id: request.location_id.clone(),
                    input: request.input.clone(),
                    params: request.params.clone(),
                };
                let outcome = orchestrator.run(input).await?;
                info!(workflow_id, profile = %scope.profile, state = outcome.state().as_str(), "run finished");
                match outcome {
                    // Keep the slot held until the caller drains the stream.
                    RunOutcome::Streaming(stream) => {
                        Ok(RunOutcome::Streaming(hold_guard(stream, guard)))
                    }
                    other => Ok(other),
                }
            }
            Action::ClearSession => {
                orchestrator.clear_session().await?;
                Ok(RunOutcome::Completed(RunResult::cleared()))
            }
            Action::RunStatus => {
                let view = orchestrator.run_status().await?;
                Ok(RunOutcome::Completed(RunResult::run_status(view)))
            }
            Action::ChatHistory { already_shown } => {
                let page = orchestrator.chat_history(already_shown).await?;
                Ok(RunOutcome::Completed(RunResult::history(page)))
            }
        }
    }

    fn acquire(
        &self,
        user_id: &str,
        scope_id: &str,
        profile: &str,
    ) -> Result<RunGuard, RunError> {
        let key = format!("{user_id}/{scope_id}/{profile}");
        {
            let mut active = self.active.lock();
            if !active.insert(key.clone()) {
                return Err(RunError::SessionBusy(key));
            }
            gauge!("sage_active_runs").set(active.len() as f64);
        }
        Ok(RunGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    fn emit(
        &self,
        request: &DispatchRequest,
        workflow_id: &str,
        name: &str,
        profile: Option<&str>,
    ) {
        let mut event = WorkflowEvent::new(
            name,
            workflow_id,
            &request.action,
            &request.course_id,
            &request.location_id,
        );
        if let Some(profile) = profile {
            event = event.with_profile(profile);
        }
        self.ctx.emitter.emit(event);
    }
}

/// Releases an active-run slot on drop.
struct RunGuard {
    active: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        let _ = active.remove(&self.key);
        gauge!("sage_active_runs").set(active.len() as f64);
    }
}

/// Tie a guard's lifetime to a stream's.
fn hold_guard(mut inner: sage_llm::ChunkStream, guard: RunGuard) -> sage_llm::ChunkStream {
    use futures::StreamExt;
    Box::pin(async_stream::stream! {
        let _guard = guard;
        while let Some(chunk) = inner.next().await {
            yield chunk;
        }
    })
}
