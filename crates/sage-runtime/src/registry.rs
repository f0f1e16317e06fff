//! Typed orchestrator-class registry.
//!
//! Configuration names an orchestrator class as a string; the registry maps
//! that string to a factory closure. The mapping is closed at startup:
//! `register` rejects malformed and duplicate names immediately, and an
//! effective configuration naming an unregistered class fails resolution
//! at dispatch, never at some later call site.

use std::collections::HashMap;
use std::sync::Arc;

use sage_config::{EffectiveConfig, Scope};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::RegistryError;
use crate::orchestrators::{
    AsyncChatOrchestrator, ChatOrchestrator, Orchestrator, SummaryOrchestrator,
};

/// Everything a factory needs to build one orchestrator instance.
pub struct OrchestratorSeed {
    /// The matched scope.
    pub scope: Scope,
    /// The validated effective configuration.
    pub config: EffectiveConfig,
    /// The requesting user.
    pub user_id: String,
    /// Shared collaborators.
    pub ctx: Arc<ExecutionContext>,
}

/// Builds one orchestrator instance per run.
pub type OrchestratorFactory = Arc<dyn Fn(OrchestratorSeed) -> Box<dyn Orchestrator> + Send + Sync>;

/// Immutable name → factory mapping.
pub struct OrchestratorRegistry {
    factories: HashMap<String, OrchestratorFactory>,
}

impl OrchestratorRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            factories: HashMap::new(),
        }
    }

    /// A registry with the four built-in classes, plus dotted
    /// fully-qualified aliases for configurations that carry them.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let chat: OrchestratorFactory = Arc::new(|seed: OrchestratorSeed| {
            // The streaming subtype is a configuration choice, not a
            // separate class.
            let streaming = seed
                .config
                .processor("chat")
                .and_then(|block| block.get("streaming"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            Box::new(ChatOrchestrator::new(
                seed.scope,
                seed.config,
                seed.user_id,
                seed.ctx,
                streaming,
            )) as Box<dyn Orchestrator>
        });
        let summary: OrchestratorFactory = Arc::new(|seed: OrchestratorSeed| {
            Box::new(SummaryOrchestrator::new(seed.config, seed.ctx)) as Box<dyn Orchestrator>
        });
        let stream_summary: OrchestratorFactory = Arc::new(|seed: OrchestratorSeed| {
            Box::new(SummaryOrchestrator::streaming(seed.config, seed.ctx))
                as Box<dyn Orchestrator>
        });
        let async_chat: OrchestratorFactory = Arc::new(|seed: OrchestratorSeed| {
            Box::new(AsyncChatOrchestrator::new(
                seed.scope,
                seed.config,
                seed.user_id,
                seed.ctx,
            )) as Box<dyn Orchestrator>
        });

        Self::builder()
            .register("chat", Arc::clone(&chat))?
            .register("summary", Arc::clone(&summary))?
            .register("stream_summary", Arc::clone(&stream_summary))?
            .register("async_chat", Arc::clone(&async_chat))?
            .register("workflows.chat", chat)?
            .register("workflows.summary", summary)?
            .register("workflows.stream_summary", stream_summary)?
            .register("workflows.async_chat", async_chat)?
            .build()
    }

    /// Look up the factory for a class name.
    pub fn resolve(&self, name: &str) -> Result<OrchestratorFactory, RegistryError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownOrchestrator(name.to_string()))
    }

    /// Registered class names, for diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Accumulates registrations, validating each name up front.
pub struct RegistryBuilder {
    factories: HashMap<String, OrchestratorFactory>,
}

impl RegistryBuilder {
    /// Register a factory under a name. Names are non-empty and drawn from
    /// `[A-Za-z0-9_.]`, the same charset the configuration schema enforces.
    pub fn register(
        mut self,
        name: &str,
        factory: OrchestratorFactory,
    ) -> Result<Self, RegistryError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.factories.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        let _ = self.factories.insert(name.to_string(), factory);
        Ok(self)
    }

    /// Finalize the registry.
    pub fn build(self) -> Result<OrchestratorRegistry, RegistryError> {
        debug!(classes = self.factories.len(), "orchestrator registry built");
        Ok(OrchestratorRegistry {
            factories: self.factories,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
