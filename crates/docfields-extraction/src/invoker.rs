use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use docfields_core::document::TextUnit;
use docfields_core::extraction::{ExtractionOutcome, StructuredExtractor};
use docfields_core::schema::BatchType;

use crate::prompt::build_prompt;

/// Runs one structured extraction per text unit and never lets an error escape.
#[derive(Clone)]
pub struct ExtractionInvoker {
    extractor: Arc<dyn StructuredExtractor>,
    unit_timeout: Duration,
}

impl ExtractionInvoker {
    pub fn new(extractor: Arc<dyn StructuredExtractor>, unit_timeout: Duration) -> Self {
        Self {
            extractor,
            unit_timeout,
        }
    }

    /// Single attempt. Any model, timeout or validation error becomes a
    /// [`ExtractionOutcome::Failure`] carrying the unit's index and raw text.
    pub async fn invoke(
        &self,
        unit: &TextUnit,
        batch: &BatchType,
        instructions: &str,
    ) -> ExtractionOutcome {
        let prompt = build_prompt(batch, instructions, unit);

        let result = match timeout(self.unit_timeout, self.extractor.extract(batch, &prompt)).await
        {
            Ok(Ok(value)) => batch.validate(&value).map_err(|e| e.to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "model call timed out after {}s",
                self.unit_timeout.as_secs_f32()
            )),
        };

        match result {
            Ok(records) => {
                debug!(
                    unit = unit.index,
                    records = records.len(),
                    extractor = %self.extractor.name(),
                    "Unit extraction succeeded"
                );
                ExtractionOutcome::Success { records }
            }
            Err(error) => {
                warn!(unit = unit.index, error = %error, "LLM extraction failed on unit");
                ExtractionOutcome::Failure {
                    unit_index: unit.index,
                    raw_text: unit.content.clone(),
                    error,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use docfields_core::schema::{build_schema, FieldDescriptor, FieldType};

    use super::*;
    use crate::mock::MockExtractor;

    fn batch() -> BatchType {
        let fields = vec![
            FieldDescriptor::new("name", FieldType::String).required(),
            FieldDescriptor::new("amount", FieldType::Float),
        ];
        build_schema(&fields).unwrap().1
    }

    fn unit(index: usize, content: &str) -> TextUnit {
        TextUnit {
            index,
            content: content.into(),
        }
    }

    fn invoker(mock: MockExtractor) -> ExtractionInvoker {
        ExtractionInvoker::new(Arc::new(mock), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_success_unwraps_batch() {
        let mock = MockExtractor::new(json!({"items": [
            {"name": "Widget", "amount": "12.5"},
            {"name": "Gadget"}
        ]}));
        let outcome = invoker(mock).invoke(&unit(1, "text"), &batch(), "").await;

        match outcome {
            ExtractionOutcome::Success { records } => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0]["amount"], json!(12.5));
                assert_eq!(records[1]["amount"], json!(null));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_error_becomes_failure() {
        let mock = MockExtractor::new(json!({"items": []})).with_failure("bad", "quota exceeded");
        let outcome = invoker(mock).invoke(&unit(4, "bad page"), &batch(), "").await;

        assert_eq!(
            outcome,
            ExtractionOutcome::Failure {
                unit_index: 4,
                raw_text: "bad page".into(),
                error: "Extraction error: quota exceeded".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_schema_violation_becomes_failure() {
        let mock = MockExtractor::new(json!({"items": [{"amount": 3}]}));
        let outcome = invoker(mock).invoke(&unit(2, "page"), &batch(), "").await;

        match outcome {
            ExtractionOutcome::Failure { unit_index, error, .. } => {
                assert_eq!(unit_index, 2);
                assert!(error.contains("name"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_failure() {
        let mock = MockExtractor::new(json!({"items": []}))
            .with_delay("slow", Duration::from_millis(200));
        let invoker = ExtractionInvoker::new(Arc::new(mock), Duration::from_millis(20));
        let outcome = invoker.invoke(&unit(1, "slow page"), &batch(), "").await;

        match outcome {
            ExtractionOutcome::Failure { error, .. } => assert!(error.contains("timed out")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_single_attempt() {
        let mock = MockExtractor::new(json!({"items": []})).with_failure("x", "boom");
        let invoker = invoker(mock.clone());
        invoker.invoke(&unit(1, "x"), &batch(), "").await;
        assert_eq!(mock.call_count(), 1);
    }
}
