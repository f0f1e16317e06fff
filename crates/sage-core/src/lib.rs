//! # sage-core
//!
//! Shared types for the Sage workflow engine: chat messages and content
//! normalization, structured course content, the content-provider contract,
//! workflow events, and the stable failure shape returned to callers.
//!
//! Everything here is collaborator-facing — the orchestration logic lives in
//! `sage-runtime`, persistence in `sage-store`, and configuration resolution
//! in `sage-config`.

#![deny(unsafe_code)]

pub mod content;
pub mod events;
pub mod failure;
pub mod messages;

pub use content::{ContentError, ContentProvider, StructuredContent};
pub use events::{EventEmitter, EventSink, WorkflowEvent};
pub use failure::{ActionFailure, FailureStatus};
pub use messages::{ChatMessage, Role, normalize_content};
