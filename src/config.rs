use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidTimeout { var: &'static str, value: String },
}

/// Settings for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// Keep the key out of debug logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Reads `GEMINI_API_KEY` (falling back to `API_KEY`), `GEMINI_MODEL`,
    /// `GEMINI_ENDPOINT` and `GEMINI_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();
        config.api_key = non_blank("GEMINI_API_KEY").or_else(|| non_blank("API_KEY"));
        if let Some(model) = non_blank("GEMINI_MODEL") {
            config.model = model.trim().to_string();
        }
        if let Some(endpoint) = non_blank("GEMINI_ENDPOINT") {
            config.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = non_blank("GEMINI_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout {
                    var: "GEMINI_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = GeminiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn gemini_key_takes_precedence_over_generic_key() {
        let config =
            GeminiConfig::from_lookup(lookup(&[("API_KEY", "generic"), ("GEMINI_API_KEY", "g")]))
                .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("g"));

        let config = GeminiConfig::from_lookup(lookup(&[("API_KEY", "generic"), ("GEMINI_API_KEY", " ")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn endpoint_loses_trailing_slash() {
        let config =
            GeminiConfig::from_lookup(lookup(&[("GEMINI_ENDPOINT", "http://127.0.0.1:9000/v1/")]))
                .unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:9000/v1");
    }

    #[test]
    fn bad_timeout_is_reported() {
        let err = GeminiConfig::from_lookup(lookup(&[("GEMINI_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidTimeout {
                var: "GEMINI_TIMEOUT_SECS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = GeminiConfig::default().with_api_key("secret-key");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("<redacted>"));
    }
}
