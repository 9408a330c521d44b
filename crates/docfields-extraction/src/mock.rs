use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use docfields_core::error::{DocfieldsError, Result};
use docfields_core::extraction::{ExtractionPrompt, StructuredExtractor};
use docfields_core::schema::BatchType;

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Error(String),
}

/// Deterministic extractor for tests. No network calls.
///
/// Rules are matched against the user prompt (which carries the unit text);
/// the first rule whose needle appears wins, otherwise the default reply is used.
///
/// ```
/// use docfields_extraction::MockExtractor;
/// use serde_json::json;
///
/// let mock = MockExtractor::new(json!({"items": []}))
///     .with_response("Invoice 7", json!({"items": [{"total": 7.0}]}))
///     .with_failure("corrupt", "malformed output");
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockExtractor {
    default_reply: Reply,
    rules: Vec<(String, Reply)>,
    delays: Vec<(String, Duration)>,
    calls: Arc<AtomicUsize>,
}

impl MockExtractor {
    pub fn new(default_response: Value) -> Self {
        Self {
            default_reply: Reply::Value(default_response),
            rules: Vec::new(),
            delays: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_response(mut self, needle: impl Into<String>, response: Value) -> Self {
        self.rules.push((needle.into(), Reply::Value(response)));
        self
    }

    pub fn with_failure(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Reply::Error(message.into())));
        self
    }

    /// Sleep before replying when the needle matches.
    pub fn with_delay(mut self, needle: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((needle.into(), delay));
        self
    }

    /// Number of `extract` calls across all clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, _batch: &BatchType, prompt: &ExtractionPrompt) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| prompt.user.contains(n)) {
            tokio::time::sleep(*delay).await;
        }

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.user.contains(needle))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default_reply);

        match reply {
            Reply::Value(v) => Ok(v.clone()),
            Reply::Error(message) => Err(DocfieldsError::UnitExtraction(message.clone())),
        }
    }
}
