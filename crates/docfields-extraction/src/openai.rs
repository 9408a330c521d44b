use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docfields_core::config::AppConfig;
use docfields_core::error::{DocfieldsError, Result};
use docfields_core::extraction::{ExtractionPrompt, StructuredExtractor};
use docfields_core::schema::BatchType;

use crate::output::parse_json_output;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Structured extraction through OpenAI Chat Completions with a JSON Schema
/// `response_format`.
pub struct OpenAiExtractor {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: Value,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiExtractor {
    pub fn new(config: &AppConfig, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: OPENAI_API_URL.to_string(),
            api_key: config.openai_api_key.clone(),
            model: model.into(),
            max_tokens: config.max_tokens,
        }
    }

    /// Point the client at a different endpoint, e.g. a proxy or gateway.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_request(&self, batch: &BatchType, prompt: &ExtractionPrompt) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            // Strict mode needs every property in `required` and no `default`
            // keywords; optional members here are nullable and left out of
            // `required`, so conformance is enforced by `BatchType::validate`.
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": batch.name,
                    "schema": batch.json_schema(),
                    "strict": false,
                }
            }),
            max_completion_tokens: self.max_tokens,
        }
    }

    fn parse_response(response: ChatResponse) -> Result<Value> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            DocfieldsError::UnitExtraction("No choices in API response".to_string())
        })?;

        if let Some(refusal) = choice.message.refusal {
            return Err(DocfieldsError::UnitExtraction(format!(
                "Model refused the request: {refusal}"
            )));
        }

        let content = choice.message.content.ok_or_else(|| {
            DocfieldsError::UnitExtraction(format!(
                "Empty message content (finish_reason: {})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        parse_json_output(&content)
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, batch: &BatchType, prompt: &ExtractionPrompt) -> Result<Value> {
        let request = self.build_request(batch, prompt);

        tracing::debug!(
            model = %self.model,
            content_len = prompt.user.len(),
            "Sending extraction request to OpenAI API"
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(DocfieldsError::UnitExtraction(format!(
                "OpenAI API returned status {status}: {body}"
            )));
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| {
            DocfieldsError::UnitExtraction(format!("Failed to parse API response: {e}"))
        })?;

        Self::parse_response(api_response)
    }
}
