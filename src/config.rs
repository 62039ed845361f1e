//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.marketscout.toml` files, and the startup checks that must pass
//! before any company is researched.

use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use crate::provider::{ApiStyle, ChatConfig, SearchConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".marketscout.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Chat model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchSettings,

    /// Report cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Stage execution settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::Markdown,
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "marketscout_report.md".to_string()
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Wire format of the chat endpoint.
    #[serde(default)]
    pub api_style: ApiStyle,

    /// Chat API base URL.
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Bearer token; prefer the MARKETSCOUT_LLM_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_style: ApiStyle::Ollama,
            base_url: default_llm_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            api_key: None,
        }
    }
}

fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_llm_timeout() -> u64 {
    300
}

/// Web search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Search API base URL.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Tavily API key; prefer the TAVILY_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,

    /// How long identical queries are answered from memory.
    #[serde(default = "default_query_cache_ttl")]
    pub query_cache_ttl_seconds: u64,

    /// Maximum number of remembered queries.
    #[serde(default = "default_query_cache_size")]
    pub query_cache_size: usize,

    /// Attempts per query.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// First retry delay in seconds; doubles on each attempt.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            api_key: None,
            max_results: default_max_results(),
            timeout_seconds: default_search_timeout(),
            query_cache_ttl_seconds: default_query_cache_ttl(),
            query_cache_size: default_query_cache_size(),
            retries: default_retries(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

fn default_search_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    60
}

fn default_query_cache_ttl() -> u64 {
    3600
}

fn default_query_cache_size() -> usize {
    100
}

fn default_retries() -> usize {
    3
}

fn default_retry_delay() -> u64 {
    2
}

/// Report cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist reports to disk.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding one JSON file per cached report.
    #[serde(default = "default_cache_dir")]
    pub directory: PathBuf,

    /// Hours a cached report stays valid.
    #[serde(default = "default_validity_hours")]
    pub validity_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_cache_dir(),
            validity_hours: default_validity_hours(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".marketscout/cache")
}

fn default_validity_hours() -> u64 {
    crate::cache::DEFAULT_VALIDITY_HOURS
}

/// Stage execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound for a single stage, in seconds.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_seconds: default_stage_timeout(),
        }
    }
}

fn default_stage_timeout() -> u64 {
    600
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(style) = args.api_style {
            self.llm.api_style = style;
        }
        if let Some(ref url) = args.llm_url {
            self.llm.base_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.llm.model = model.clone();
        }
        if let Some(temperature) = args.temperature {
            self.llm.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.llm.timeout_seconds = timeout;
        }
        if let Some(ref key) = args.llm_api_key {
            self.llm.api_key = Some(key.clone());
        }

        if let Some(ref key) = args.search_api_key {
            self.search.api_key = Some(key.clone());
        }

        if let Some(ref dir) = args.cache_dir {
            self.cache.directory = dir.clone();
        }
        if let Some(hours) = args.validity_hours {
            self.cache.validity_hours = hours;
        }
        if args.no_persist {
            self.cache.enabled = false;
        }

        if let Some(timeout) = args.stage_timeout {
            self.pipeline.stage_timeout_seconds = timeout;
        }
    }

    /// Check everything a research run needs before it starts.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !non_blank(&self.search.api_key) {
            return Err(ConfigError::MissingCredential(
                "web search API key (TAVILY_API_KEY or [search].api_key)",
            ));
        }
        if self.llm.api_style == ApiStyle::Openai && !non_blank(&self.llm.api_key) {
            return Err(ConfigError::MissingCredential(
                "LLM API key (MARKETSCOUT_LLM_API_KEY or [llm].api_key)",
            ));
        }

        if !is_http_url(&self.llm.base_url) {
            return Err(ConfigError::Invalid {
                field: "llm.base_url",
                reason: "must start with 'http://' or 'https://'".to_string(),
            });
        }
        if !is_http_url(&self.search.base_url) {
            return Err(ConfigError::Invalid {
                field: "search.base_url",
                reason: "must start with 'http://' or 'https://'".to_string(),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "llm.model",
                reason: "must not be empty".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                field: "llm.temperature",
                reason: "must be between 0.0 and 2.0".to_string(),
            });
        }

        let positive = [
            ("llm.timeout_seconds", self.llm.timeout_seconds),
            ("search.timeout_seconds", self.search.timeout_seconds),
            ("search.max_results", self.search.max_results as u64),
            ("pipeline.stage_timeout_seconds", self.pipeline.stage_timeout_seconds),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        self.cache_validity()?;

        Ok(())
    }

    /// Validity window of cached reports.
    pub fn cache_validity(&self) -> std::result::Result<chrono::Duration, ConfigError> {
        crate::cache::validity_window(self.cache.validity_hours)
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            api_style: self.llm.api_style,
            base_url: self.llm.base_url.clone(),
            model_name: self.llm.model.clone(),
            api_key: self.llm.api_key.clone().filter(|k| !k.trim().is_empty()),
            temperature: self.llm.temperature,
            timeout_seconds: self.llm.timeout_seconds,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            base_url: self.search.base_url.clone(),
            api_key: self.search.api_key.clone().unwrap_or_default(),
            timeout_seconds: self.search.timeout_seconds,
            cache_ttl: Duration::from_secs(self.search.query_cache_ttl_seconds),
            cache_size: self.search.query_cache_size,
            retries: self.search.retries,
            retry_delay: Duration::from_secs(self.search.retry_delay_seconds),
        }
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.stage_timeout_seconds)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn valid() -> Config {
        let mut config = Config::default();
        config.search.api_key = Some("tvly-test".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "llama3.2:latest");
        assert_eq!(config.cache.validity_hours, 24);
        assert_eq!(config.pipeline.stage_timeout_seconds, 600);
        assert_eq!(config.search.max_results, 5);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "retail.md"
format = "json"

[llm]
api_style = "openai"
base_url = "https://openrouter.ai/api/v1"
model = "gpt-4o-mini"
api_key = "sk-test"

[cache]
validity_hours = 12
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "retail.md");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.llm.api_style, ApiStyle::Openai);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.cache.validity_hours, 12);
        assert_eq!(config.search.base_url, "https://api.tavily.com");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[llm]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[pipeline]"));
        assert!(!toml_str.contains("api_key"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.pipeline.stage_timeout_seconds, 600);
    }

    #[test]
    fn test_validate_requires_search_key() {
        assert_eq!(
            Config::default().validate(),
            Err(ConfigError::MissingCredential(
                "web search API key (TAVILY_API_KEY or [search].api_key)"
            ))
        );
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_openai_requires_llm_key() {
        let mut config = valid();
        config.llm.api_style = ApiStyle::Openai;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential(_))
        ));

        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = valid();
        config.llm.base_url = "localhost:11434".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "llm.base_url", .. })
        ));

        let mut config = valid();
        config.cache.validity_hours = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "cache.validity_hours", .. })
        ));
    }

    #[test]
    fn test_huge_validity_window_is_rejected() {
        let mut config = valid();
        config.cache.validity_hours = u64::MAX;
        assert!(matches!(
            config.cache_validity(),
            Err(ConfigError::Invalid { field: "cache.validity_hours", .. })
        ));
        assert!(config.validate().is_err());

        config.cache.validity_hours = 48;
        assert_eq!(config.cache_validity().unwrap(), chrono::Duration::hours(48));
    }

    #[test]
    fn test_merge_with_args_only_overrides_given_flags() {
        let mut config = valid();
        config.llm.model = "from-file".to_string();

        let args = Args::try_parse_from([
            "marketscout",
            "--industry",
            "Retail",
            "Acme",
            "--no-persist",
            "--stage-timeout",
            "30",
            "--output",
            "out.json",
        ])
        .unwrap();
        let model_from_env = args.model.clone();
        config.merge_with_args(&args);

        if model_from_env.is_none() {
            assert_eq!(config.llm.model, "from-file");
        }
        assert!(!config.cache.enabled);
        assert_eq!(config.pipeline.stage_timeout_seconds, 30);
        assert_eq!(config.general.output, "out.json");
        assert_eq!(config.stage_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_provider_configs() {
        let mut config = valid();
        config.llm.api_key = Some("  ".to_string());

        assert_eq!(config.chat_config().api_key, None);
        let search = config.search_config();
        assert_eq!(search.api_key, "tvly-test");
        assert_eq!(search.cache_ttl, Duration::from_secs(3600));
        assert_eq!(search.retries, 3);
    }
}
