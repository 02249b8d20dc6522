use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shelfdesk_core::config::LlmConfig;
use shelfdesk_core::domain::conversation::ChatMessage;
use thiserror::Error;
use tracing::{debug, warn};

const MAX_TOKENS: u32 = 1024;

/// Single-shot chat completion. Callers assemble the whole context.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32)
        -> Result<String, LlmError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed backend response: {0}")]
    InvalidResponse(String),
    #[error("backend misconfigured: {0}")]
    Configuration(String),
}

impl LlmError {
    /// Client errors other than rate limiting will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::InvalidResponse(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Configuration(_) => false,
        }
    }
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.provider.requires_api_key() && config.api_key.is_none() {
            return Err(LlmError::Configuration(format!(
                "provider {:?} requires llm.api_key",
                config.provider
            )));
        }

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.effective_base_url()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens: MAX_TOKENS,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::Network(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;

        extract_text(parsed)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse("no content in the first choice".to_string()))
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    LlmError::Api { status: status.as_u16(), message }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            attempt_timeout: Duration::from_secs(config.timeout_secs.max(1)),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(10),
            backoff: Duration::from_millis(500),
        }
    }
}

/// Wraps a backend with bounded attempts, a per-attempt timeout and a fixed backoff.
///
/// Every backend call made by the agent goes through this wrapper.
#[derive(Clone)]
pub struct ResilientLlm {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl ResilientLlm {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmClient for ResilientLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let prompt_chars = messages.iter().map(|message| message.content.len()).sum::<usize>();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                event_name = "agent.llm.request",
                attempt,
                messages = messages.len(),
                prompt_chars,
                temperature,
                "calling generative backend"
            );

            let outcome = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.complete(messages, temperature),
            )
            .await
            .unwrap_or(Err(LlmError::Timeout(self.policy.attempt_timeout)));

            match outcome {
                Ok(text) => return Ok(text),
                Err(error) if attempt < max_attempts && error.is_retryable() => {
                    warn!(
                        event_name = "agent.llm.retry",
                        attempt,
                        max_attempts,
                        error = %error,
                        "generative backend call failed, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use shelfdesk_core::domain::conversation::ChatMessage;

    use super::{map_http_error, LlmClient, LlmError, ResilientLlm, RetryPolicy};

    struct Scripted {
        outcomes: Mutex<Vec<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<String, LlmError>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self { outcomes: Mutex::new(outcomes), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .expect("script lock")
                .pop()
                .unwrap_or_else(|| Err(LlmError::Network("script exhausted".to_string())))
        }
    }

    struct Stalled;

    #[async_trait]
    impl LlmClient for Stalled {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
        ) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            attempt_timeout: Duration::from_millis(50),
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let backend = Scripted::new(vec![
            Err(LlmError::Network("connection reset".to_string())),
            Ok("Your order has shipped.".to_string()),
        ]);
        let llm = ResilientLlm::new(backend.clone(), fast_policy(2));

        let text = llm.complete(&[ChatMessage::user("hi")], 0.3).await.expect("second attempt");
        assert_eq!(text, "Your order has shipped.");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let backend = Scripted::new(vec![Err(LlmError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        })]);
        let llm = ResilientLlm::new(backend.clone(), fast_policy(3));

        let error = llm.complete(&[ChatMessage::user("hi")], 0.3).await.expect_err("401");
        assert!(matches!(error, LlmError::Api { status: 401, .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stalled_backend_times_out() {
        let llm = ResilientLlm::new(Arc::new(Stalled), fast_policy(2));

        let error = llm.complete(&[ChatMessage::user("hi")], 0.5).await.expect_err("timeout");
        assert!(matches!(error, LlmError::Timeout(_)));
    }

    #[test]
    fn http_errors_carry_the_backend_message() {
        let error = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"rate limited","type":"requests"}}"#,
        );
        assert_eq!(error, LlmError::Api { status: 429, message: "rate limited".to_string() });
        assert!(error.is_retryable());

        let plain = map_http_error(StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(plain, LlmError::Api { status: 400, message: "bad input".to_string() });
        assert!(!plain.is_retryable());
    }
}
