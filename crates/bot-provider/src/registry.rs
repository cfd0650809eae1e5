//! Builds the two in-scope provider adapters from config. Used by the
//! gateway's DI root to resolve `bot.provider` strings without every call
//! site needing to know adapter construction details.

use std::sync::Arc;

use bot_core::config::ProvidersConfig;

use crate::cache::ContextCacheStore;
use crate::error::{ProviderError, Result};
use crate::gemini::GeminiAdapter;
use crate::openai::OpenAiAdapter;
use crate::provider::Provider;

/// Builds the adapter named by `provider` ("gemini" or "openai"), sharing
/// one `ContextCacheStore` across both so maturation bookkeeping stays
/// consistent regardless of which provider a bot is configured to use.
/// A blank provider string defaults to "gemini" (§4.5 step 4).
pub fn build_provider(provider: &str, config: &ProvidersConfig, cache: Arc<ContextCacheStore>) -> Result<Arc<dyn Provider>> {
    let provider = if provider.trim().is_empty() { "gemini" } else { provider };
    match provider {
        "gemini" => {
            let cfg = config
                .gemini
                .as_ref()
                .ok_or_else(|| ProviderError::Api { status: 0, message: "gemini provider not configured".into() })?;
            Ok(Arc::new(GeminiAdapter::new(cfg.api_key.clone(), cfg.base_url.clone(), cache)))
        }
        "openai" => {
            let cfg = config
                .openai
                .as_ref()
                .ok_or_else(|| ProviderError::Api { status: 0, message: "openai provider not configured".into() })?;
            Ok(Arc::new(OpenAiAdapter::new(cfg.api_key.clone(), cfg.base_url.clone(), cache)))
        }
        other => Err(ProviderError::Api { status: 0, message: format!("unknown provider: {other}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_errors() {
        let cache = Arc::new(ContextCacheStore::new(None));
        let result = build_provider("unknown", &ProvidersConfig::default(), cache);
        assert!(result.is_err());
    }

    #[test]
    fn missing_gemini_config_errors() {
        let cache = Arc::new(ContextCacheStore::new(None));
        let result = build_provider("gemini", &ProvidersConfig::default(), cache);
        assert!(result.is_err());
    }

    #[test]
    fn blank_provider_defaults_to_gemini() {
        let cache = Arc::new(ContextCacheStore::new(None));
        let config = ProvidersConfig {
            gemini: Some(bot_core::config::GeminiConfig {
                api_key: "key".into(),
                base_url: "https://example.test".into(),
                default_model: "gemini-2.5-flash".into(),
            }),
            openai: None,
        };
        assert!(build_provider("", &config, Arc::clone(&cache)).is_ok());
        assert!(build_provider("   ", &config, cache).is_ok());
    }
}
