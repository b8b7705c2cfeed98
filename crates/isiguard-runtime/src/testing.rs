//! In-process collaborators for tests. Nothing here touches the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

/// Replies from a queue, then repeats a default reply once the queue is empty.
pub(crate) struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
}

impl ScriptedProvider {
    /// Always answers `reply`.
    pub fn always(reply: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Some(reply.to_string()),
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Answers each entry once, in order; fails with a 503 afterwards.
    pub fn sequence(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            queue: Mutex::new(replies.into()),
            fallback: None,
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Every call fails with `error()`.
    pub fn failing(error: fn() -> ProviderError) -> Self {
        let provider = Self::sequence(Vec::new());
        *provider.queue.lock() = (0..64).map(|_| Err(error())).collect();
        provider
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared call counter.
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue.lock().pop_front();
        let content = match next {
            Some(reply) => reply?,
            None => self.fallback.clone().ok_or(ProviderError::ApiError {
                status: 503,
                message: "script exhausted".to_string(),
            })?,
        };

        Ok(CompletionResponse {
            usage: TokenUsage {
                prompt_tokens: 200,
                completion_tokens: u32::try_from(content.len() / 4).unwrap_or(u32::MAX),
                ..Default::default()
            },
            content,
            model: config.model.clone(),
            stop_reason: Some("end_turn".to_string()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
