//! Page-wise extraction pipeline: schema → segments → per-unit extraction → envelope.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use docfields_core::api_types::ResultEnvelope;
use docfields_core::config::PipelineOptions;
use docfields_core::document::{segment, PageSelection, PageSource, TextUnit};
use docfields_core::error::{DocfieldsError, Result};
use docfields_core::extraction::{ExtractionOutcome, StructuredExtractor};
use docfields_core::schema::{build_schema, BatchType, FieldDescriptor};

use crate::invoker::ExtractionInvoker;

pub struct ExtractionPipeline {
    invoker: ExtractionInvoker,
    options: PipelineOptions,
}

impl ExtractionPipeline {
    pub fn new(extractor: Arc<dyn StructuredExtractor>, options: PipelineOptions) -> Self {
        Self {
            invoker: ExtractionInvoker::new(extractor, options.unit_timeout),
            options,
        }
    }

    /// Run the whole pipeline. Always returns an envelope; fatal errors before
    /// extraction produce a failed one with no partial output.
    ///
    /// Page text is extracted on the blocking pool.
    pub async fn run(
        &self,
        document: Arc<dyn PageSource>,
        fields: &[FieldDescriptor],
        instructions: &str,
        start_page: usize,
        count: PageSelection,
    ) -> ResultEnvelope {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("extraction_run", %run_id);

        async {
            match self
                .try_run(document, fields, instructions, start_page, count)
                .await
            {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!(error = %e, "Extraction failed");
                    ResultEnvelope::failed(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_run(
        &self,
        document: Arc<dyn PageSource>,
        fields: &[FieldDescriptor],
        instructions: &str,
        start_page: usize,
        count: PageSelection,
    ) -> Result<ResultEnvelope> {
        let (_, batch) = build_schema(fields)?;
        let units = tokio::task::spawn_blocking(move || {
            segment(document.as_ref(), start_page, count)
        })
        .await
        .map_err(|e| DocfieldsError::Internal(format!("segmentation task failed: {e}")))??;

        info!(
            units = units.len(),
            start_page,
            count = %count,
            fields = fields.len(),
            "Extracted text from document"
        );

        let outcomes = self.extract_units(batch.clone(), units, instructions).await;

        let units_processed = outcomes.len();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let entries: Vec<Value> = outcomes
            .into_iter()
            .flat_map(ExtractionOutcome::into_entries)
            .collect();

        if failed > 0 {
            warn!(
                units = units_processed,
                failed,
                items = entries.len(),
                "Extraction completed with failed units"
            );
        } else {
            info!(
                units = units_processed,
                items = entries.len(),
                "Extraction completed"
            );
        }

        ResultEnvelope::completed(batch.json_schema(), &entries, units_processed)
    }

    /// One outcome per unit, in unit order.
    pub async fn extract_units(
        &self,
        batch: BatchType,
        units: Vec<TextUnit>,
        instructions: &str,
    ) -> Vec<ExtractionOutcome> {
        if self.options.concurrency <= 1 || units.len() <= 1 {
            self.extract_sequential(&batch, &units, instructions).await
        } else {
            self.extract_concurrent(batch, units, instructions).await
        }
    }

    async fn extract_sequential(
        &self,
        batch: &BatchType,
        units: &[TextUnit],
        instructions: &str,
    ) -> Vec<ExtractionOutcome> {
        let total = units.len();
        let mut outcomes = Vec::with_capacity(total);
        for (i, unit) in units.iter().enumerate() {
            info!(unit = unit.index, "Processing unit {}/{}", i + 1, total);
            let outcome = invoke_with_retries(
                &self.invoker,
                unit,
                batch,
                instructions,
                self.options.retry_attempts,
            )
            .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Dispatches units on a `JoinSet` bounded by a semaphore, then restores unit order.
    async fn extract_concurrent(
        &self,
        batch: BatchType,
        units: Vec<TextUnit>,
        instructions: &str,
    ) -> Vec<ExtractionOutcome> {
        let total = units.len();
        let batch = Arc::new(batch);
        let instructions: Arc<str> = Arc::from(instructions);
        let permits = Arc::new(Semaphore::new(self.options.concurrency));
        let retries = self.options.retry_attempts;

        info!(
            units = total,
            concurrency = self.options.concurrency,
            "Dispatching units concurrently"
        );

        let mut join_set = JoinSet::new();
        for (slot, unit) in units.iter().enumerate() {
            let invoker = self.invoker.clone();
            let batch = Arc::clone(&batch);
            let instructions = Arc::clone(&instructions);
            let permits = Arc::clone(&permits);
            let unit = unit.clone();

            join_set.spawn(
                async move {
                    let _permit = permits.acquire_owned().await.ok();
                    info!(unit = unit.index, "Processing unit {}/{}", slot + 1, total);
                    let outcome =
                        invoke_with_retries(&invoker, &unit, &batch, &instructions, retries).await;
                    (slot, outcome)
                }
                .in_current_span(),
            );
        }

        let mut buffered: Vec<Option<ExtractionOutcome>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, outcome)) => buffered[slot] = Some(outcome),
                Err(join_err) => {
                    error!(error = %join_err, "Extraction task panicked");
                }
            }
        }

        buffered
            .into_iter()
            .zip(units)
            .map(|(outcome, unit)| {
                outcome.unwrap_or_else(|| ExtractionOutcome::Failure {
                    unit_index: unit.index,
                    raw_text: unit.content,
                    error: "extraction task aborted".to_string(),
                })
            })
            .collect()
    }
}

/// Orchestration-level retry: re-invoke a failed unit up to `retries` extra times.
async fn invoke_with_retries(
    invoker: &ExtractionInvoker,
    unit: &TextUnit,
    batch: &BatchType,
    instructions: &str,
    retries: u32,
) -> ExtractionOutcome {
    let mut outcome = invoker.invoke(unit, batch, instructions).await;
    let mut attempt = 0;
    while !outcome.is_success() && attempt < retries {
        attempt += 1;
        info!(unit = unit.index, attempt, "Retrying failed unit");
        outcome = invoker.invoke(unit, batch, instructions).await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use docfields_core::document::DocumentError;
    use docfields_core::schema::FieldType;

    use super::*;
    use crate::mock::MockExtractor;

    struct Pages(Vec<&'static str>);

    impl PageSource for Pages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn plain_text(&self, page: usize) -> std::result::Result<String, DocumentError> {
            Ok(self.0[page].to_string())
        }
    }

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("item", FieldType::String).required(),
            FieldDescriptor::new("qty", FieldType::Integer),
        ]
    }

    fn pages(texts: Vec<&'static str>) -> Arc<dyn PageSource> {
        Arc::new(Pages(texts))
    }

    fn pipeline(mock: &MockExtractor, options: PipelineOptions) -> ExtractionPipeline {
        ExtractionPipeline::new(Arc::new(mock.clone()), options)
    }

    fn records(envelope: &ResultEnvelope) -> Vec<Value> {
        match envelope.records().unwrap() {
            Value::Array(items) => items,
            other => panic!("expected array, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_aggregates_in_unit_order() {
        let mock = MockExtractor::new(json!({"items": []}))
            .with_response("alpha", json!({"items": [{"item": "a1"}, {"item": "a2", "qty": 2}]}))
            .with_response("beta", json!({"items": [{"item": "b1"}]}));
        let doc = pages(vec!["alpha page", "beta page"]);

        let envelope = pipeline(&mock, PipelineOptions::default())
            .run(doc, &fields(), "", 1, PageSelection::All)
            .await;

        assert!(envelope.success);
        assert_eq!(envelope.units_processed, 2);
        assert_eq!(envelope.total_items, 3);
        let items: Vec<Value> = records(&envelope).iter().map(|r| r["item"].clone()).collect();
        assert_eq!(items, vec![json!("a1"), json!("a2"), json!("b1")]);
        assert_eq!(envelope.schema.as_ref().unwrap()["title"], "ExtractionBatch");
    }

    #[tokio::test]
    async fn test_schema_error_aborts_before_model_calls() {
        let mock = MockExtractor::new(json!({"items": []}));
        let doc = pages(vec!["text"]);
        let dup = vec![
            FieldDescriptor::new("item", FieldType::String),
            FieldDescriptor::new("item", FieldType::Integer),
        ];

        let envelope = pipeline(&mock, PipelineOptions::default())
            .run(doc, &dup, "", 1, PageSelection::All)
            .await;

        assert!(!envelope.success);
        assert!(envelope.schema.is_none());
        assert!(envelope.error.as_deref().unwrap().contains("duplicate field name"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_range_aborts_before_model_calls() {
        let mock = MockExtractor::new(json!({"items": []}));
        let doc = pages(vec!["one", "two"]);

        let envelope = pipeline(&mock, PipelineOptions::default())
            .run(doc, &fields(), "", 5, PageSelection::All)
            .await;

        assert!(!envelope.success);
        assert_eq!(envelope.units_processed, 0);
        assert_eq!(envelope.total_items, 0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retries_recover_nothing_when_failure_persists() {
        let mock = MockExtractor::new(json!({"items": []})).with_failure("flaky", "503");
        let doc = pages(vec!["flaky page"]);
        let options = PipelineOptions {
            retry_attempts: 2,
            ..PipelineOptions::default()
        };

        let envelope = pipeline(&mock, options)
            .run(doc, &fields(), "", 1, PageSelection::All)
            .await;

        assert!(envelope.success);
        assert_eq!(mock.call_count(), 3);
        let out = records(&envelope);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["page"], 1);
    }

    #[tokio::test]
    async fn test_no_retry_after_success() {
        let mock = MockExtractor::new(json!({"items": [{"item": "x"}]}));
        let doc = pages(vec!["a", "b"]);
        let options = PipelineOptions {
            retry_attempts: 3,
            ..PipelineOptions::default()
        };

        pipeline(&mock, options)
            .run(doc, &fields(), "", 1, PageSelection::All)
            .await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_keeps_unit_order() {
        let mock = MockExtractor::new(json!({"items": []}))
            .with_response("first", json!({"items": [{"item": "one"}]}))
            .with_response("second", json!({"items": [{"item": "two"}]}))
            .with_response("third", json!({"items": [{"item": "three"}]}))
            .with_delay("first", Duration::from_millis(80))
            .with_delay("second", Duration::from_millis(40));
        let doc = pages(vec!["first", "second", "third"]);
        let options = PipelineOptions {
            concurrency: 3,
            ..PipelineOptions::default()
        };

        let envelope = pipeline(&mock, options)
            .run(doc, &fields(), "", 1, PageSelection::All)
            .await;

        let items: Vec<Value> = records(&envelope).iter().map(|r| r["item"].clone()).collect();
        assert_eq!(items, vec![json!("one"), json!("two"), json!("three")]);
    }

    struct SlowPages {
        pages: usize,
        per_page: Duration,
    }

    impl PageSource for SlowPages {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn plain_text(&self, page: usize) -> std::result::Result<String, DocumentError> {
            std::thread::sleep(self.per_page);
            Ok(format!("page {}", page + 1))
        }
    }

    #[tokio::test]
    async fn test_segmentation_does_not_block_the_runtime() {
        let mock = MockExtractor::new(json!({"items": []}));
        let doc: Arc<dyn PageSource> = Arc::new(SlowPages {
            pages: 3,
            per_page: Duration::from_millis(150),
        });

        let started = std::time::Instant::now();
        let ticker = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            started.elapsed()
        });

        let envelope = pipeline(&mock, PipelineOptions::default())
            .run(doc, &fields(), "", 1, PageSelection::All)
            .await;
        let woke_after = ticker.await.unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.units_processed, 3);
        assert!(
            woke_after < Duration::from_millis(300),
            "timer task starved for {woke_after:?} while pages were read"
        );
    }
}
