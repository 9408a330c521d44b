use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::document::{PageSelection, TextUnit};
use crate::error::Result;
use crate::schema::FieldDescriptor;

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub default_model: String,
    pub anthropic_configured: bool,
    pub openai_configured: bool,
}

// --- Extraction ---

fn default_start_page() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub document_path: String,
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_start_page")]
    pub start_page: usize,
    #[serde(default)]
    pub count: PageSelection,
}

/// The single aggregated result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    /// JSON Schema of the batch type, or null when the run failed.
    pub schema: Option<Value>,
    /// Pretty-printed JSON: an array of records on success, `{"error": ...}` on failure.
    #[serde(rename = "json_output")]
    pub serialized_records: String,
    #[serde(rename = "pages_processed")]
    pub units_processed: usize,
    pub total_items: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEnvelope {
    pub fn completed(schema: Value, entries: &[Value], units_processed: usize) -> Result<Self> {
        Ok(Self {
            success: true,
            schema: Some(schema),
            serialized_records: serde_json::to_string_pretty(entries)?,
            units_processed,
            total_items: entries.len(),
            error: None,
        })
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let serialized_records = serde_json::to_string_pretty(&json!({ "error": message }))
            .unwrap_or_else(|_| String::from("{}"));
        Self {
            success: false,
            schema: None,
            serialized_records,
            units_processed: 0,
            total_items: 0,
            error: Some(message),
        }
    }

    /// Parse `serialized_records` back into JSON.
    pub fn records(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.serialized_records)?)
    }
}

// --- Preview ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub document_path: String,
    #[serde(default = "default_start_page")]
    pub start_page: usize,
    #[serde(default)]
    pub count: PageSelection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub units: Vec<TextUnit>,
    pub total: usize,
}
