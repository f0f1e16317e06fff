//! # sage-llm
//!
//! The model-call collaborator contract. The engine never speaks a provider
//! wire protocol itself; it depends on [`CompletionProvider`] for blocking
//! completions and incremental streams, including continuation of
//! provider-side conversation threads.
//!
//! [`ScriptedProvider`] is the in-process stand-in used by the runtime's
//! tests: deterministic replies, optional mid-stream failure injection.

#![deny(unsafe_code)]

pub mod chunks;
pub mod provider;
pub mod scripted;

pub use chunks::{ChunkStream, StreamChunk};
pub use provider::{Completion, CompletionParams, CompletionProvider, ProviderError};
pub use scripted::ScriptedProvider;
