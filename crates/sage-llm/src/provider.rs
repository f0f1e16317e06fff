//! Core abstraction for model-call backends.
//!
//! Implementations live outside this workspace (they own HTTP transport,
//! auth, token accounting). The engine only needs: one blocking completion
//! call, one streaming call, and the remote-thread capability flag that
//! decides the chat history strategy.

use async_trait::async_trait;
use sage_core::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::chunks::ChunkStream;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP-ish status code.
        status: u16,
        /// Error description.
        message: String,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
    },

    /// The incremental source failed mid-stream.
    #[error("Stream error: {message}")]
    Stream {
        /// Error description.
        message: String,
    },

    /// Request was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Stream { .. } | Self::Cancelled | Self::Other { .. } => false,
        }
    }

    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::RateLimited { .. } => "rate_limit",
            Self::Stream { .. } => "stream",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Parameters for one completion call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionParams {
    /// Model override; the provider default applies when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Continue an existing provider-side thread instead of sending
    /// history explicitly. Mutually exclusive with replayed history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_thread: Option<String>,
}

/// Result of a blocking completion call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Full reply text.
    pub text: String,
    /// Total tokens consumed.
    pub tokens_used: u64,
    /// Model that produced the reply.
    pub model_used: String,
    /// Stable provider-side thread id, reported whenever the provider
    /// created or continued one, so the session can persist it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_thread_id: Option<String>,
}

/// Core model-call provider trait.
///
/// Implementors must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Default model id for this provider.
    fn model(&self) -> &str;

    /// Whether the provider supports native server-side threading. When
    /// true, the engine references a stored remote thread id instead of
    /// replaying history.
    fn supports_remote_threads(&self) -> bool {
        false
    }

    /// One blocking completion round trip.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> ProviderResult<Completion>;

    /// One streaming completion. The returned stream yields `Delta` chunks
    /// and terminates with a single `Done` chunk once the source is
    /// exhausted.
    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> ProviderResult<ChunkStream>;
}
