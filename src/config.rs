//! Runtime configuration for the generation service
//!
//! Read once at process startup and injected into the client, so nothing
//! in the crate reaches for the environment after construction.

use std::env;

/// Default extraction model. Pro tier for document reasoning and arithmetic.
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-3-pro-preview";

/// Default conversational model. Flash tier keeps follow-up turns fast.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub extraction_model: String,
    pub chat_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }

    /// Load settings from the process environment.
    ///
    /// A missing `GEMINI_API_KEY` is not an error here: the server should
    /// still boot and report the missing credential per operation, so the
    /// check is deferred to the client's pre-flight.
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("GEMINI_API_KEY").unwrap_or_else(|_| String::new()),
            base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            extraction_model: env::var("GEMINI_EXTRACTION_MODEL")
                .unwrap_or_else(|_| DEFAULT_EXTRACTION_MODEL.to_string()),
            chat_model: env::var("GEMINI_CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
        }
    }

    /// True when a usable credential is present. The `.env.example`
    /// placeholder counts as absent.
    pub fn has_credential(&self) -> bool {
        !self.api_key.is_empty() && self.api_key != "your_gemini_api_key_here"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_models() {
        let config = GeminiConfig::new("test_key".to_string());
        assert_eq!(config.extraction_model, DEFAULT_EXTRACTION_MODEL);
        assert_eq!(config.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_has_credential() {
        assert!(GeminiConfig::new("real_key".to_string()).has_credential());
        assert!(!GeminiConfig::new(String::new()).has_credential());
        assert!(!GeminiConfig::new("your_gemini_api_key_here".to_string()).has_credential());
    }
}
