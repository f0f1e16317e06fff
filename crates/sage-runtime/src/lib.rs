//! # sage-runtime
//!
//! The execution engine: the [`Dispatcher`] resolves each request to a
//! scope, profile, and effective configuration, builds an orchestrator
//! through the [`OrchestratorRegistry`], and normalizes every outcome to
//! `RunOutcome::{Completed, Streaming, Failed}`.
//!
//! Session transcripts live in `sage-store` and are managed here by the
//! [`SessionManager`]; deferred work runs on the [`tasks::TaskQueue`].

#![deny(unsafe_code)]

pub mod context;
pub mod dispatcher;
pub mod errors;
pub mod orchestrators;
pub mod registry;
pub mod sessions;
pub mod tasks;
pub mod types;

pub use context::{ExecutionContext, RuntimeSettings};
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use errors::{RegistryError, RunError};
pub use orchestrators::Orchestrator;
pub use registry::{OrchestratorFactory, OrchestratorRegistry, OrchestratorSeed};
pub use sessions::SessionManager;
pub use tasks::{TaskQueue, TaskStatus, TokioTaskQueue};
pub use types::{Action, HistoryPage, RunInput, RunOutcome, RunResult, RunState};
