//! Completion backend implementations for Murmur.
//!
//! One client covers every backend the aggregator talks to, since both
//! Ollama and hosted services expose an OpenAI-compatible
//! `/v1/chat/completions` endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatBackend;

use murmur_config::AppConfig;
use murmur_core::backend::CompletionBackend;
use murmur_core::error::Error;
use std::sync::Arc;

/// Build the configured completion backend.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn CompletionBackend>, Error> {
    let backend = &config.backend;
    match backend.provider.as_str() {
        "ollama" => Ok(Arc::new(OpenAiCompatBackend::ollama(
            backend.base_url.as_deref(),
            backend.timeout_secs,
        ))),
        "openai" => {
            let api_key = backend.api_key.clone().ok_or_else(|| Error::Config {
                message: "openai backend requires an api_key".into(),
            })?;
            Ok(Arc::new(OpenAiCompatBackend::openai(
                api_key,
                backend.timeout_secs,
            )))
        }
        other => Err(Error::Config {
            message: format!("unknown backend provider: {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_from_default_config() {
        let config = AppConfig::default();
        let backend = build_from_config(&config).unwrap();
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn openai_without_key_fails() {
        let mut config = AppConfig::default();
        config.backend.provider = "openai".into();
        assert!(build_from_config(&config).is_err());
    }

    #[test]
    fn unknown_provider_fails() {
        let mut config = AppConfig::default();
        config.backend.provider = "mystery".into();
        assert!(build_from_config(&config).is_err());
    }
}
