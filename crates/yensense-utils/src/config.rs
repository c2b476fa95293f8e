//! Application configuration
//!
//! Loaded from a TOML file when one exists, then overridden from the
//! environment. Every section and field is optional.
//!
//! ```toml
//! [llm]
//! model = "gpt-4o-mini"
//! temperature = 0.3
//!
//! [market]
//! cache_ttl_secs = 600
//!
//! [pipeline]
//! error_ceiling = 10
//! report_kind = "daily"
//!
//! [output]
//! report_dir = "reports"
//!
//! [logging]
//! format = "json"
//! ```

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use yensense_llm::AnalystConfig;
use yensense_market::MarketConfig;
use yensense_pipeline::PipelineConfig;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// `[llm]`: completion provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// OpenAI-compatible endpoint, `OPENAI_API_BASE` overrides
    pub api_base: Option<String>,
    /// `OPENAI_API_KEY` overrides
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let analyst = AnalystConfig::default();
        Self {
            model: analyst.model,
            temperature: analyst.temperature,
            timeout_secs: analyst.timeout.as_secs(),
            api_base: None,
            api_key: None,
        }
    }
}

impl LlmSettings {
    pub fn analyst_config(&self) -> AnalystConfig {
        AnalystConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
        .with_env_model()
    }
}

/// `[market]`: data provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub fred_api_key: Option<String>,
    pub alpha_vantage_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub fred_rate_limit: u32,
    pub alpha_vantage_rate_limit: u32,
    pub cache_ttl_secs: u64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        let market = MarketConfig::default();
        Self {
            fred_api_key: None,
            alpha_vantage_api_key: None,
            request_timeout_secs: market.request_timeout.as_secs(),
            fred_rate_limit: market.fred_rate_limit,
            alpha_vantage_rate_limit: market.alpha_vantage_rate_limit,
            cache_ttl_secs: market.cache_ttl.as_secs(),
        }
    }
}

impl MarketSettings {
    /// Market configuration with keys missing from the file taken from the environment
    pub fn market_config(&self) -> MarketConfig {
        MarketConfig {
            fred_api_key: self.fred_api_key.clone(),
            alpha_vantage_api_key: self.alpha_vantage_api_key.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fred_rate_limit: self.fred_rate_limit,
            alpha_vantage_rate_limit: self.alpha_vantage_rate_limit,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
        .with_env_api_keys()
    }
}

/// `[output]`: where finished reports go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub report_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("reports"),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub market: MarketSettings,
    pub pipeline: PipelineConfig,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply environment overrides
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            Self::from_toml(&content).map_err(|e| match e {
                ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                    path: path.to_path_buf(),
                    reason,
                },
                other => other,
            })?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })
    }

    /// `OPENAI_API_KEY`, `OPENAI_API_BASE` and `YENSENSE_LOG_FORMAT` override the file
    pub fn apply_env(&mut self) {
        if let Some(key) = non_empty_env("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = non_empty_env("OPENAI_API_BASE") {
            self.llm.api_base = Some(base);
        }
        if let Some(format) = non_empty_env("YENSENSE_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.logging.format = format,
                Err(e) => tracing::warn!("Ignoring YENSENSE_LOG_FORMAT: {}", e),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be greater than 0".into(),
            ));
        }

        self.market
            .market_config()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.pipeline
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(())
    }

    /// Default configuration as TOML
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yensense_pipeline::ReportKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.output.report_dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [market]
            cache_ttl_secs = 600

            [pipeline]
            error_ceiling = 4
            report_kind = "daily"
            reasoning_fallback_cap = 3

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.market.cache_ttl_secs, 600);
        assert_eq!(config.market.fred_rate_limit, 120);
        assert_eq!(config.pipeline.error_ceiling, 4);
        assert_eq!(config.pipeline.report_kind, ReportKind::DailyBrief);
        assert_eq!(config.pipeline.reasoning_fallback_cap, Some(3));
        assert_eq!(config.pipeline.max_questions, 7);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.llm, LlmSettings::default());
    }

    #[test]
    fn test_llm_section_splits_provider_and_analyst_settings() {
        let config = AppConfig::from_toml(
            r#"
            [llm]
            model = "gpt-4o"
            timeout_secs = 45
            api_base = "http://localhost:1234/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.api_base.as_deref(), Some("http://localhost:1234/v1"));
        assert_eq!(config.llm.api_key, None);

        let analyst = config.llm.analyst_config();
        assert_eq!(analyst.timeout, Duration::from_secs(45));
        assert!((analyst.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.max_questions = 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/yensense.toml")).unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yensense.toml");
        std::fs::write(&path, "[output]\nreport_dir = \"out\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.output.report_dir, PathBuf::from("out"));

        std::fs::write(&path, "[pipeline\n").unwrap();
        match AppConfig::load_from(&path) {
            Err(ConfigError::ParseError { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_toml_round_trips() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[pipeline]"));
        assert_eq!(AppConfig::from_toml(&toml_str).unwrap(), AppConfig::default());
    }
}
