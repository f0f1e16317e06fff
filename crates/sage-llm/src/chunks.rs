//! Incremental output protocol.
//!
//! A stream yields zero or more `Delta` chunks followed by exactly one
//! `Done` chunk. `Done` is a property of stream exhaustion: consumers must
//! not treat the call returning as completion.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::provider::ProviderError;

/// One chunk of incremental model output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// An incremental piece of the reply text.
    Delta {
        /// Text fragment.
        text: String,
    },
    /// Terminal chunk, emitted once when the source is exhausted.
    #[serde(rename_all = "camelCase")]
    Done {
        /// Total tokens consumed by the call.
        tokens_used: u64,
        /// Model that produced the reply.
        model_used: String,
        /// Provider-side thread id, when one was created or continued.
        #[serde(skip_serializing_if = "Option::is_none")]
        remote_thread_id: Option<String>,
    },
}

impl StreamChunk {
    /// Delta text, if this is a delta chunk.
    #[must_use]
    pub fn delta_text(&self) -> Option<&str> {
        match self {
            Self::Delta { text } => Some(text),
            Self::Done { .. } => None,
        }
    }

    /// Whether this is the terminal chunk.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Boxed stream of chunks returned by a streaming completion.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;
