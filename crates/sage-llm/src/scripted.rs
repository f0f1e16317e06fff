//! Deterministic in-process provider for tests.
//!
//! Replies are scripted up front and consumed in order; every call is
//! recorded for assertions on history strategy (explicit replay vs remote
//! thread). Streams can be told to fail after N deltas to exercise
//! buffer-then-commit paths.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sage_core::ChatMessage;

use crate::chunks::{ChunkStream, StreamChunk};
use crate::provider::{Completion, CompletionParams, CompletionProvider, ProviderError, ProviderResult};

/// One recorded provider call.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// Messages as received.
    pub messages: Vec<ChatMessage>,
    /// Params as received.
    pub params: CompletionParams,
}

/// Scripted provider.
pub struct ScriptedProvider {
    model: String,
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    supports_threads: bool,
    fail_stream_after: Option<usize>,
    thread_counter: AtomicU64,
}

impl ScriptedProvider {
    fn base(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            model: "scripted-1".to_string(),
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
            supports_threads: false,
            fail_stream_after: None,
            thread_counter: AtomicU64::new(0),
        }
    }

    /// Create a provider that answers with the given replies in order.
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Arc<Self> {
        Arc::new(Self::base(replies))
    }

    /// Create a provider with native server-side threading.
    pub fn with_remote_threads(
        replies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Arc<Self> {
        let mut provider = Self::base(replies);
        provider.supports_threads = true;
        Arc::new(provider)
    }

    /// Create a provider whose streams fail after `deltas` chunks.
    pub fn failing_after(deltas: usize) -> Arc<Self> {
        let mut provider = Self::base(["this reply never finishes streaming"]);
        provider.fail_stream_after = Some(deltas);
        Arc::new(provider)
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn next_reply(&self) -> String {
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| "scripted reply".to_string())
    }

    fn record(&self, messages: &[ChatMessage], params: &CompletionParams) {
        self.calls.lock().push(RecordedCall {
            messages: messages.to_vec(),
            params: params.clone(),
        });
    }

    fn thread_id(&self, params: &CompletionParams) -> Option<String> {
        if !self.supports_threads {
            return None;
        }
        params.remote_thread.clone().or_else(|| {
            let n = self.thread_counter.fetch_add(1, Ordering::Relaxed);
            Some(format!("thread-{n}"))
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn supports_remote_threads(&self) -> bool {
        self.supports_threads
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> ProviderResult<Completion> {
        self.record(messages, params);
        let text = self.next_reply();
        let tokens_used = (text.len() / 4 + 1) as u64;
        Ok(Completion {
            text,
            tokens_used,
            model_used: params.model.clone().unwrap_or_else(|| self.model.clone()),
            remote_thread_id: self.thread_id(params),
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &CompletionParams,
    ) -> ProviderResult<ChunkStream> {
        self.record(messages, params);
        let text = self.next_reply();
        let tokens_used = (text.len() / 4 + 1) as u64;
        let model_used = params.model.clone().unwrap_or_else(|| self.model.clone());
        let remote_thread_id = self.thread_id(params);
        let fail_after = self.fail_stream_after;

        let stream = async_stream::stream! {
            let mut emitted = 0usize;
            for word in text.split_inclusive(' ') {
                if fail_after.is_some_and(|n| emitted >= n) {
                    yield Err(ProviderError::Stream {
                        message: "scripted mid-stream failure".to_string(),
                    });
                    return;
                }
                yield Ok(StreamChunk::Delta { text: word.to_string() });
                emitted += 1;
            }
            yield Ok(StreamChunk::Done {
                tokens_used,
                model_used,
                remote_thread_id,
            });
        };
        Ok(Box::pin(stream))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
