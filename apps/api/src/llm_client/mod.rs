//! LLM client: the single point of entry for all reasoning-service calls.
//!
//! ARCHITECTURAL RULE: No other module may call the completion API directly.
//! Pipeline components receive a `&dyn ReasoningService` and never build their own client.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Transport failure, 429 or 5xx on every attempt. Safe to retry later.
    #[error("Reasoning service unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: String },

    /// The provider rejected the request outright. Not retried.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed completion envelope: {0}")]
    Malformed(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A single system + user completion call. Implemented by `LlmClient` in production
/// and by scripted doubles in tests.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Connection and sampling settings for `LlmClient`.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_attempts: u32,
    /// First backoff delay; doubled on every further attempt.
    pub retry_base_delay: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// The process-wide client for an OpenAI-compatible chat-completions endpoint.
/// Wraps the API with timeout, bounded retry and exponential backoff.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    /// Makes a raw call to the completion API, returning the full response object.
    /// Retries on transport errors, 429 and 5xx with exponential backoff.
    pub async fn call(&self, system: &str, user: &str) -> Result<ChatResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let endpoint = self.endpoint();
        let max_attempts = self.settings.max_attempts.max(1);

        let mut last_error = String::from("no attempt made");

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.retry_base_delay, attempt);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&endpoint)
                .bearer_auth(&self.settings.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!("LLM transport error: {e}");
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = format!("status {status}: {body}");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let chat_response: ChatResponse = response
                .json()
                .await
                .map_err(|e| LlmError::Malformed(e.to_string()))?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(chat_response);
        }

        Err(LlmError::Unavailable {
            attempts: max_attempts,
            last: last_error,
        })
    }
}

#[async_trait]
impl ReasoningService for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let response = self.call(system, user).await?;
        response
            .text()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// Exponential backoff before retry number `attempt` (1-based), saturating instead of
/// overflowing for large attempt counts.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Deserializes a completion as JSON after removing any code fence around it.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_json_fences(text))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}


#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "  {\"key\": \"value\"}\n";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_json_through_fence() {
        let value: Value = parse_json("```json\n{\"criteria\": [\"Rust\"]}\n```").unwrap();
        assert_eq!(value["criteria"][0], "Rust");
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
    }

    /// Mock completion endpoint: fails with `failures_before_success` 503s, then answers.
    struct MockProvider {
        hits: AtomicU32,
        failures_before_success: u32,
        reject_with: Option<StatusCode>,
        last_body: std::sync::Mutex<Option<Value>>,
    }

    async fn completions(
        State(mock): State<Arc<MockProvider>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let hit = mock.hits.fetch_add(1, Ordering::SeqCst);
        *mock.last_body.lock().unwrap() = Some(body);

        if let Some(status) = mock.reject_with {
            return (
                status,
                Json(json!({"error": {"message": "invalid api key"}})),
            );
        }
        if hit < mock.failures_before_success {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": {"message": "overloaded"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"criteria\": []}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4}
            })),
        )
    }

    async fn spawn_provider(mock: Arc<MockProvider>) -> SocketAddr {
        let app = Router::new()
            .route("/chat/completions", post(completions))
            .with_state(mock);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn mock(failures_before_success: u32, reject_with: Option<StatusCode>) -> Arc<MockProvider> {
        Arc::new(MockProvider {
            hits: AtomicU32::new(0),
            failures_before_success,
            reject_with,
            last_body: std::sync::Mutex::new(None),
        })
    }

    fn client_for(addr: SocketAddr, max_attempts: u32) -> LlmClient {
        LlmClient::new(LlmSettings {
            api_key: "test-key".to_string(),
            base_url: format!("http://{addr}/"),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(5),
            max_attempts,
            retry_base_delay: Duration::from_millis(1),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_and_sends_settings() {
        let provider = mock(0, None);
        let addr = spawn_provider(provider.clone()).await;
        let client = client_for(addr, 3);

        let text = client.complete("system text", "user text").await.unwrap();
        assert_eq!(text, "{\"criteria\": []}");

        let body = provider.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "system text");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "user text");
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let provider = mock(2, None);
        let addr = spawn_provider(provider.clone()).await;
        let client = client_for(addr, 3);

        assert!(client.complete("s", "u").await.is_ok());
        assert_eq!(provider.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_as_unavailable_after_max_attempts() {
        let provider = mock(10, None);
        let addr = spawn_provider(provider.clone()).await;
        let client = client_for(addr, 2);

        let err = client.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { attempts: 2, .. }));
        assert_eq!(provider.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let provider = mock(0, Some(StatusCode::UNAUTHORIZED));
        let addr = spawn_provider(provider.clone()).await;
        let client = client_for(addr, 3);

        let err = client.complete("s", "u").await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        // Bind then drop to get a port nothing is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(addr, 2);
        let err = client.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { .. }));
    }
}
