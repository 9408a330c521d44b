use std::sync::Arc;

use docfields_core::config::AppConfig;
use docfields_core::error::{DocfieldsError, Result};
use docfields_core::extraction::StructuredExtractor;

mod anthropic;
mod invoker;
mod mock;
mod openai;
mod orchestrator;
mod output;
mod prompt;

pub use anthropic::AnthropicExtractor;
pub use invoker::ExtractionInvoker;
pub use mock::MockExtractor;
pub use openai::OpenAiExtractor;
pub use orchestrator::ExtractionPipeline;
pub use output::parse_json_output;
pub use prompt::build_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
}

const OPENAI_PREFIXES: &[&str] = &["gpt", "o1", "o3", "o4", "chatgpt"];

impl Provider {
    pub fn for_model(model: &str) -> Option<Self> {
        let model = model.trim().to_lowercase();
        if model.starts_with("claude") {
            Some(Provider::Anthropic)
        } else if OPENAI_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(Provider::OpenAi)
        } else {
            None
        }
    }
}

/// Build the extractor for a model name, checking that its provider has credentials.
pub fn extractor_for_model(
    config: &AppConfig,
    model: &str,
) -> Result<Arc<dyn StructuredExtractor>> {
    let model = model.trim();
    match Provider::for_model(model) {
        Some(Provider::Anthropic) => {
            if config.anthropic_api_key.is_empty() {
                return Err(DocfieldsError::Config(
                    "ANTHROPIC_API_KEY is not set".to_string(),
                ));
            }
            Ok(Arc::new(AnthropicExtractor::new(config, model)))
        }
        Some(Provider::OpenAi) => {
            if config.openai_api_key.is_empty() {
                return Err(DocfieldsError::Config(
                    "OPENAI_API_KEY is not set".to_string(),
                ));
            }
            Ok(Arc::new(OpenAiExtractor::new(config, model)))
        }
        None => Err(DocfieldsError::Config(format!(
            "Unknown model provider for '{model}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys() -> AppConfig {
        AppConfig {
            anthropic_api_key: "sk-ant".into(),
            openai_api_key: "sk-oai".into(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("claude-haiku-4-5-20251001"), Some(Provider::Anthropic));
        assert_eq!(Provider::for_model("gpt-4o-mini"), Some(Provider::OpenAi));
        assert_eq!(Provider::for_model("o3-mini"), Some(Provider::OpenAi));
        assert_eq!(Provider::for_model("GPT-4.1"), Some(Provider::OpenAi));
        assert_eq!(Provider::for_model("llama3"), None);
    }

    #[test]
    fn test_extractor_for_model_picks_provider() {
        let config = config_with_keys();
        assert_eq!(
            extractor_for_model(&config, "claude-sonnet-4-5").unwrap().name(),
            "claude-sonnet-4-5"
        );
        assert_eq!(
            extractor_for_model(&config, "gpt-4o").unwrap().name(),
            "gpt-4o"
        );
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = extractor_for_model(&AppConfig::default(), "gpt-4o").err().unwrap();
        assert!(matches!(err, DocfieldsError::Config(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_unknown_model_is_config_error() {
        let err = extractor_for_model(&config_with_keys(), "mistral-large").err().unwrap();
        assert!(matches!(err, DocfieldsError::Config(_)));
    }
}
