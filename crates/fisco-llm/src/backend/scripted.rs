//! Scripted backend replaying canned replies, for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::LlmError;
use crate::{CompletionRequest, LlmBackend, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Backend answering from a fixed script.
///
/// Replies are consumed in order; the last one repeats forever.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Reply>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn from_script(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::from_script(vec![Reply::Text(reply.into())])
    }

    /// Answer with each reply in turn, repeating the last one.
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_script(replies.into_iter().map(|r| Reply::Text(r.into())).collect())
    }

    /// Always fail with a request error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::from_script(vec![Reply::Fail(message.into())])
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_reply(&self) -> Option<Reply> {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(prompt) = request.user_prompt() {
            self.prompts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        debug!("Scripted completion #{}", call);

        match self.next_reply() {
            Some(Reply::Text(text)) if text.trim().is_empty() => Err(LlmError::EmptyResponse),
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(LlmError::Request(message)),
            None => Err(LlmError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request() -> CompletionRequest {
        CompletionRequest::new("system", "user prompt")
    }

    #[tokio::test]
    async fn test_replies_in_order_then_repeats_last() {
        let backend = ScriptedBackend::from_replies(["first", "second"]);

        assert_eq!(backend.complete(&request()).await.unwrap(), "first");
        assert_eq!(backend.complete(&request()).await.unwrap(), "second");
        assert_eq!(backend.complete(&request()).await.unwrap(), "second");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let backend = ScriptedBackend::failing("connection refused");
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Request(_)));
    }

    #[tokio::test]
    async fn test_records_prompts() {
        let backend = ScriptedBackend::replying("ok");
        backend.complete(&request()).await.unwrap();
        assert_eq!(backend.prompts(), vec!["user prompt".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_reply_is_empty_response() {
        let backend = ScriptedBackend::replying("   ");
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
