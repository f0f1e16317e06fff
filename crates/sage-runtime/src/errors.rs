//! Runtime error types and their mapping to the caller-facing failure shape.
//!
//! Every collaborator error converges on [`RunError`]; the dispatcher turns
//! it into an [`ActionFailure`] via [`RunError::to_failure`], so callers
//! always see the stable `{status, error}` JSON object.

use sage_config::ResolveError;
use sage_core::{ActionFailure, ContentError, FailureStatus};
use sage_llm::ProviderError;
use sage_store::StoreError;
use thiserror::Error;

/// Errors from orchestrator-class registration and lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No orchestrator class is registered under this name.
    #[error("unknown orchestrator class: {0}")]
    UnknownOrchestrator(String),

    /// The name violates the identifier charset (`[A-Za-z0-9_.]`, non-empty).
    #[error("invalid orchestrator class name: {0:?}")]
    InvalidName(String),

    /// A factory is already registered under this name.
    #[error("orchestrator class already registered: {0}")]
    DuplicateName(String),
}

/// Any failure on the path from dispatch to outcome.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Registry lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Content fetch failed.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Model call failed.
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence failed.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    /// Another run is already active for this session.
    #[error("session busy: a run is already in progress for {0}")]
    SessionBusy(String),

    /// The orchestrator class does not support the requested action.
    #[error("action not supported by this workflow: {0}")]
    UnsupportedAction(String),

    /// Request input is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// Which failure class this error surfaces as.
    #[must_use]
    pub fn status(&self) -> FailureStatus {
        match self {
            Self::Resolve(e) if e.is_not_found() => FailureStatus::NotFound,
            Self::Resolve(ResolveError::Invalid(_)) => FailureStatus::Validation,
            Self::Resolve(_) => FailureStatus::Processing,
            Self::Content(ContentError::NotFound { .. }) => FailureStatus::Validation,
            Self::SessionBusy(_) | Self::UnsupportedAction(_) | Self::InvalidInput(_) => {
                FailureStatus::Validation
            }
            Self::Registry(_)
            | Self::Content(ContentError::Access(_))
            | Self::Provider(_)
            | Self::Store(_)
            | Self::Internal(_) => FailureStatus::Processing,
        }
    }

    /// Error category string for event emission and metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Resolve(e) => e.category(),
            Self::Registry(_) => "registry",
            Self::Content(e) => e.category(),
            Self::Provider(e) => e.category(),
            Self::Store(_) => "store",
            Self::SessionBusy(_) => "session_busy",
            Self::UnsupportedAction(_) => "unsupported_action",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert into the stable caller-facing failure shape.
    #[must_use]
    pub fn to_failure(&self) -> ActionFailure {
        ActionFailure {
            status: self.status(),
            error: self.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
