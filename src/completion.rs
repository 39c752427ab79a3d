//! Remote completion client.
//!
//! One fixed (configurable) chat-completions endpoint, called with the
//! credential in an `api-key` header. Credentials are sanitized to a
//! conservative character allow-list before use; an empty-after-cleaning key
//! is a structured error, never a panic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str =
    "https://cerebrum.example.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-12-01-preview";
pub const DEFAULT_MODEL: &str = "gpt-4o";

static KEY_DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\-_.+=/]").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("invalid API key format")]
    InvalidApiKey,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("API request failed: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("API responded but format unexpected")]
    MalformedResponse,
}

/// Strip every character outside the API-key allow-list
/// (letters, digits, `- _ . + = /`). Idempotent.
pub fn sanitize_api_key(raw: &str) -> Result<String, CompletionError> {
    let cleaned = KEY_DISALLOWED.replace_all(raw.trim(), "").to_string();
    if cleaned.is_empty() {
        return Err(CompletionError::InvalidApiKey);
    }
    if cleaned.len() != raw.trim().len() {
        tracing::warn!(
            original = raw.trim().len(),
            cleaned = cleaned.len(),
            "API key contained disallowed characters"
        );
    }
    Ok(cleaned)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct CompletionClient {
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(endpoint: String, model: String) -> Self {
        Self { endpoint, model, client: reqwest::Client::new() }
    }

    /// Send one completion request and return the first choice's content,
    /// trimmed.
    pub async fn complete(
        &self,
        api_key: &str,
        messages: Vec<ApiMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let key = sanitize_api_key(api_key)?;
        let request = CompletionRequest { model: self.model.clone(), messages, max_tokens, temperature };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("api-key", key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "completion request rejected");
            return Err(CompletionError::Api { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|c| c.trim().to_string())
            .ok_or(CompletionError::MalformedResponse)
    }

    /// Fire a canned one-word prompt to verify the credential and endpoint.
    pub async fn test_connection(&self, api_key: &str) -> (bool, String) {
        let messages = vec![
            ApiMessage::system("You are a helpful assistant."),
            ApiMessage::user("Say hello in one word."),
        ];
        match self.complete(api_key, messages, 10, 0.1).await {
            Ok(_) => (true, "API connection successful!".to_string()),
            Err(CompletionError::InvalidApiKey) => (false, "Invalid API key format".to_string()),
            Err(e) => (false, format!("API Error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_api_key("abc\u{200b} 123!").unwrap(), "abc123");
        assert_eq!(sanitize_api_key("  key-1_2.3+4=5/6  ").unwrap(), "key-1_2.3+4=5/6");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_api_key("ab\tcd-ef").unwrap();
        let twice = sanitize_api_key(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_after_cleaning_is_error() {
        assert!(matches!(sanitize_api_key("   "), Err(CompletionError::InvalidApiKey)));
        assert!(matches!(sanitize_api_key("!!!###"), Err(CompletionError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_complete_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  Hello there.  "}}]
            })))
            .mount(&server)
            .await;

        let client =
            CompletionClient::new(format!("{}/chat/completions", server.uri()), "gpt-4o".to_string());
        let out = client
            .complete("test-key", vec![ApiMessage::user("hi")], 150, 0.7)
            .await
            .unwrap();
        assert_eq!(out, "Hello there.");
    }

    #[tokio::test]
    async fn test_non_2xx_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = CompletionClient::new(server.uri(), "gpt-4o".to_string());
        let err = client
            .complete("test-key", vec![ApiMessage::user("hi")], 150, 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let client = CompletionClient::new(server.uri(), "gpt-4o".to_string());
        let err = client
            .complete("test-key", vec![ApiMessage::user("hi")], 150, 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::MalformedResponse));
    }
}
