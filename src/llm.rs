//! Chat-completion client for reply generation
//!
//! Speaks the OpenAI-compatible `chat/completions` protocol. Groq is the
//! default endpoint; any compatible server works through `base_url`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ports::ResponseGenerator;
use crate::{Error, Result};

/// Default endpoint
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.8;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Generates replies through a chat-completion endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    /// Create a client for the given endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(base_url: impl Into<String>, api_key: String, model: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("LLM API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model,
        })
    }
}

#[async_trait]
impl ResponseGenerator for ChatClient {
    async fn generate(&self, prompt: &str, user_message: &str) -> Result<Option<String>> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Llm(format!("completion API error {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(first_content(parsed))
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_config_error() {
        assert!(matches!(
            ChatClient::new(GROQ_API_BASE, "  ".to_string(), DEFAULT_MODEL.to_string()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ChatClient::new("http://localhost:8080/v1/", "k".to_string(), "m".to_string())
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model, "m");
    }

    #[test]
    fn empty_or_blank_content_is_none() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(first_content(parsed), None);

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert_eq!(first_content(parsed), None);

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(first_content(parsed), None);
    }

    #[test]
    fn content_is_trimmed() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" That sounds hard. \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(parsed).as_deref(), Some("That sounds hard."));
    }
}
