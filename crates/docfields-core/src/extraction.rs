use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::schema::{BatchType, Record};

/// The two messages sent to a model for one text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    pub system: String,
    pub user: String,
}

/// A model capable of returning output constrained to a [`BatchType`].
///
/// Implementations return the raw batch value; validation against the record type
/// happens in the caller so every provider gets the same coercion rules.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, batch: &BatchType, prompt: &ExtractionPrompt) -> Result<Value>;
}

/// The result of processing one text unit. Every unit yields exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Success {
        records: Vec<Record>,
    },
    Failure {
        unit_index: usize,
        raw_text: String,
        error: String,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    /// Entries this outcome contributes to the aggregated output.
    pub fn into_entries(self) -> Vec<Value> {
        match self {
            ExtractionOutcome::Success { records } => {
                records.into_iter().map(Value::Object).collect()
            }
            ExtractionOutcome::Failure {
                unit_index,
                raw_text,
                error,
            } => vec![json!({
                "page": unit_index,
                "raw_text": raw_text,
                "error": error,
            })],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_becomes_error_record() {
        let outcome = ExtractionOutcome::Failure {
            unit_index: 2,
            raw_text: "page two".into(),
            error: "timeout".into(),
        };
        assert!(!outcome.is_success());

        let entries = outcome.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            serde_json::to_string(&entries[0]).unwrap(),
            r#"{"page":2,"raw_text":"page two","error":"timeout"}"#
        );
    }

    #[test]
    fn test_success_contributes_each_record() {
        let mut a = Record::new();
        a.insert("name".into(), json!("A"));
        let mut b = Record::new();
        b.insert("name".into(), json!("B"));

        let entries = ExtractionOutcome::Success { records: vec![a, b] }.into_entries();
        assert_eq!(entries, vec![json!({"name": "A"}), json!({"name": "B"})]);

        assert!(ExtractionOutcome::Success { records: vec![] }
            .into_entries()
            .is_empty());
    }
}
