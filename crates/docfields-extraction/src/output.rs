use serde_json::Value;

use docfields_core::error::{DocfieldsError, Result};

/// Parse model text output as JSON, tolerating markdown code fences.
pub fn parse_json_output(raw: &str) -> Result<Value> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        tracing::error!(raw = %cleaned, error = %e, "Failed to parse model JSON output");
        DocfieldsError::UnitExtraction(format!("Failed to parse model JSON output: {e}"))
    })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let start = trimmed.find(['{', '[']).unwrap_or(0);
    let end = trimmed
        .rfind(['}', ']'])
        .map(|i| i + 1)
        .unwrap_or(trimmed.len());
    if start < end {
        &trimmed[start..end]
    } else {
        trimmed
    }
}
