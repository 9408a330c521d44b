use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docfields_core::config::AppConfig;
use docfields_core::error::{DocfieldsError, Result};
use docfields_core::extraction::{ExtractionPrompt, StructuredExtractor};
use docfields_core::schema::BatchType;

use crate::output::parse_json_output;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Name of the forced tool whose input carries the extracted batch.
const EXTRACTION_TOOL: &str = "record_extraction";

/// Structured extraction through the Anthropic Messages API.
///
/// The batch schema is offered as the `input_schema` of a single tool and the
/// model is forced to call it, so the tool input is the structured output.
pub struct AnthropicExtractor {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

// ── Anthropic Messages API request/response types ──────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    tool_choice: ToolChoice,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

// ── Implementation ─────────────────────────────────────────────────────────

impl AnthropicExtractor {
    pub fn new(config: &AppConfig, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key: config.anthropic_api_key.clone(),
            model: model.into(),
            max_tokens: config.max_tokens,
        }
    }

    /// Point the client at a different endpoint, e.g. a proxy or gateway.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    fn build_request(&self, batch: &BatchType, prompt: &ExtractionPrompt) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: prompt.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
            tools: vec![Tool {
                name: EXTRACTION_TOOL.to_string(),
                description: format!(
                    "Record every {} found in the text as one entry of `items`.",
                    batch.record.name
                ),
                input_schema: batch.json_schema(),
            }],
            tool_choice: ToolChoice {
                choice_type: "tool".to_string(),
                name: EXTRACTION_TOOL.to_string(),
            },
        }
    }

    /// Prefer the forced tool call; fall back to JSON in a text block.
    fn parse_response(response: AnthropicResponse) -> Result<Value> {
        if let Some(input) = response
            .content
            .iter()
            .find(|block| block.block_type == "tool_use")
            .and_then(|block| block.input.clone())
        {
            return Ok(input);
        }

        let text = response
            .content
            .iter()
            .find_map(|block| {
                if block.block_type == "text" {
                    block.text.clone()
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                DocfieldsError::UnitExtraction(format!(
                    "No tool_use or text block in API response (stop_reason: {})",
                    response.stop_reason.as_deref().unwrap_or("unknown")
                ))
            })?;

        parse_json_output(&text)
    }
}

#[async_trait]
impl StructuredExtractor for AnthropicExtractor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn extract(&self, batch: &BatchType, prompt: &ExtractionPrompt) -> Result<Value> {
        let request = self.build_request(batch, prompt);

        tracing::debug!(
            model = %self.model,
            content_len = prompt.user.len(),
            "Sending extraction request to Anthropic API"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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
                "Anthropic API returned status {status}: {body}"
            )));
        }

        let api_response: AnthropicResponse = response.json().await.map_err(|e| {
            DocfieldsError::UnitExtraction(format!("Failed to parse API response: {e}"))
        })?;

        tracing::debug!(
            stop_reason = ?api_response.stop_reason,
            blocks = api_response.content.len(),
            "Received extraction response from Anthropic API"
        );

        Self::parse_response(api_response)
    }
}
