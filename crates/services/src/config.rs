use std::env;
use std::fmt;
use std::time::Duration;

use medquiz_core::extract::ExtractOptions;
use medquiz_core::model::WordBand;
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-1.0-pro"];
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Load `.env` from the working directory or its parents, if present.
/// Variables already set in the process environment win.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "could not read .env"),
    }
}

/// Generation endpoint settings, read from the environment.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Fallback chain, tried in order.
    pub models: Vec<String>,
    pub timeout: Duration,
    pub cache_bust: bool,
    pub word_band: WordBand,
    /// How generated question batches are pulled out of model text.
    pub extract: ExtractOptions,
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("timeout", &self.timeout)
            .field("cache_bust", &self.cache_bust)
            .field("word_band", &self.word_band)
            .field("extract", &self.extract)
            .finish()
    }
}

impl AiConfig {
    /// Config with defaults for everything but the key.
    #[must_use]
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            models: DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_bust: true,
            word_band: WordBand::default(),
            extract: ExtractOptions::default(),
        }
    }

    /// Read configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` when `GEMINI_API_KEY` is unset or
    /// blank, and `InvalidValue` for unparsable optional settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`AiConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::with_api_key(api_key.trim());

        if let Some(base_url) = lookup("MEDQUIZ_AI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(models) = lookup("MEDQUIZ_AI_MODELS") {
            config.models = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if config.models.is_empty() {
                return Err(ConfigError::NoModels);
            }
        }
        if let Some(secs) = lookup("MEDQUIZ_AI_TIMEOUT_SECS") {
            let secs: u64 = parse_value("MEDQUIZ_AI_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "MEDQUIZ_AI_TIMEOUT_SECS",
                    value: "0".into(),
                });
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = lookup("MEDQUIZ_CACHE_BUST") {
            config.cache_bust = parse_bool("MEDQUIZ_CACHE_BUST", &flag)?;
        }
        if let Some(min) = lookup("MEDQUIZ_GRADING_MIN_WORDS") {
            config.word_band.min = parse_value("MEDQUIZ_GRADING_MIN_WORDS", &min)?;
        }
        if let Some(max) = lookup("MEDQUIZ_GRADING_MAX_WORDS") {
            let max: usize = parse_value("MEDQUIZ_GRADING_MAX_WORDS", &max)?;
            config.word_band.max = (max > 0).then_some(max);
        }
        if let Some(strategy) = lookup("MEDQUIZ_SCAN_STRATEGY") {
            config.extract.strategy = parse_value("MEDQUIZ_SCAN_STRATEGY", &strategy)?;
        }
        if let Some(policy) = lookup("MEDQUIZ_EXTRACT_POLICY") {
            config.extract.policy = parse_value("MEDQUIZ_EXTRACT_POLICY", &policy)?;
        }
        if let Some(max) = config.word_band.max {
            if max < config.word_band.min {
                return Err(ConfigError::InvalidValue {
                    key: "MEDQUIZ_GRADING_MAX_WORDS",
                    value: max.to_string(),
                });
            }
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medquiz_core::extract::{BatchPolicy, ScanStrategy};
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = AiConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        let err = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_apply() {
        let config = AiConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.models, DEFAULT_MODELS);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.cache_bust);
        assert_eq!(config.word_band, WordBand::default());
        assert_eq!(config.extract, ExtractOptions::default());
        assert!(!format!("{config:?}").contains("\"k\""));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_AI_MODELS", "m1, m2,,"),
            ("MEDQUIZ_AI_TIMEOUT_SECS", "15"),
            ("MEDQUIZ_CACHE_BUST", "off"),
            ("MEDQUIZ_GRADING_MIN_WORDS", "10"),
            ("MEDQUIZ_GRADING_MAX_WORDS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.models, ["m1", "m2"]);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(!config.cache_bust);
        assert_eq!(config.word_band, WordBand { min: 10, max: None });
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_AI_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "MEDQUIZ_AI_TIMEOUT_SECS",
                ..
            }
        ));
        let err = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_GRADING_MIN_WORDS", "60"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn extraction_settings_are_parsed() {
        let config = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_SCAN_STRATEGY", "Greedy"),
            ("MEDQUIZ_EXTRACT_POLICY", "keep-valid"),
        ]))
        .unwrap();
        assert_eq!(config.extract.strategy, ScanStrategy::Greedy);
        assert_eq!(config.extract.policy, BatchPolicy::KeepValid);

        let err = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_EXTRACT_POLICY", "lenient"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "MEDQUIZ_EXTRACT_POLICY",
                ..
            }
        ));
        let err = AiConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEDQUIZ_SCAN_STRATEGY", "regex"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "MEDQUIZ_SCAN_STRATEGY",
                ..
            }
        ));
    }
}
