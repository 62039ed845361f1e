//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation of flag combinations.

use crate::provider::ApiStyle;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// MarketScout - multi-stage AI research reports for companies
///
/// Researches each company within an industry through seven stages
/// (industry research, use cases, recommendations, resources, competitors,
/// implementation plans, cost-benefit) and writes a Markdown or JSON report.
/// Finished reports are cached for 24 hours.
///
/// Examples:
///   marketscout --industry Retail "Acme Corp" "Globex"
///   marketscout --industry Retail "Acme Corp" --refresh --format json
///   marketscout --list-cache
///   marketscout --invalidate --industry Retail "Acme Corp"
///   marketscout --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Companies to research, in report order
    #[arg(value_name = "COMPANY")]
    pub companies: Vec<String>,

    /// Industry shared by every company in the batch
    #[arg(short, long, value_name = "INDUSTRY")]
    pub industry: Option<String>,

    /// Output file path for the combined report
    ///
    /// Default: from config or marketscout_report.md
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .marketscout.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (no progress bars, errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Ignore cached reports and research every company again
    ///
    /// Fresh results still replace the cached ones.
    #[arg(long)]
    pub refresh: bool,

    /// Keep reports in memory only for this run
    #[arg(long)]
    pub no_persist: bool,

    /// Exit with code 2 when any stage of any report did not succeed
    #[arg(long)]
    pub fail_on_degraded: bool,

    /// Name recorded in the logs as the requester of this batch
    #[arg(long, value_name = "NAME")]
    pub requested_by: Option<String>,

    /// Chat API style (ollama, openai)
    #[arg(long, value_name = "STYLE")]
    pub api_style: Option<ApiStyle>,

    /// Chat API base URL
    #[arg(long, value_name = "URL", env = "MARKETSCOUT_LLM_URL")]
    pub llm_url: Option<String>,

    /// Model used by every stage
    #[arg(short, long, env = "MARKETSCOUT_MODEL")]
    pub model: Option<String>,

    /// API key for the chat endpoint (required for --api-style openai)
    #[arg(long, value_name = "KEY", env = "MARKETSCOUT_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Tavily web search API key
    #[arg(long, value_name = "KEY", env = "TAVILY_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// LLM request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Upper bound for a single stage in seconds
    #[arg(long, value_name = "SECS")]
    pub stage_timeout: Option<u64>,

    /// Directory holding cached reports
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Hours a cached report stays valid
    #[arg(long, value_name = "HOURS")]
    pub validity_hours: Option<u64>,

    /// List cached reports and exit
    #[arg(long)]
    pub list_cache: bool,

    /// Delete every cached report and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Delete expired cached reports and exit
    #[arg(long)]
    pub purge_expired: bool,

    /// Delete the cached reports of the given companies and exit
    #[arg(long, requires = "industry")]
    pub invalidate: bool,

    /// Generate a default .marketscout.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when only cache maintenance was requested.
    pub fn is_maintenance(&self) -> bool {
        self.list_cache || self.clear_cache || self.purge_expired || self.invalidate
    }

    /// Industry label, trimmed; empty when not given.
    pub fn industry(&self) -> &str {
        self.industry.as_deref().map(str::trim).unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.invalidate && self.companies.is_empty() {
            return Err("--invalidate needs at least one company".to_string());
        }

        if !self.is_maintenance() {
            if self.companies.is_empty() {
                return Err("At least one company is required".to_string());
            }
            if self.industry().is_empty() {
                return Err("--industry is required".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if self.stage_timeout == Some(0) {
            return Err("Stage timeout must be at least 1 second".to_string());
        }
        if let Some(hours) = self.validity_hours {
            if !(1..=crate::cache::MAX_VALIDITY_HOURS).contains(&hours) {
                return Err(format!(
                    "Validity window must be between 1 and {} hours",
                    crate::cache::MAX_VALIDITY_HOURS
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            companies: vec!["Acme Corp".to_string()],
            industry: Some("Retail".to_string()),
            output: None,
            format: None,
            config: None,
            verbose: false,
            quiet: false,
            refresh: false,
            no_persist: false,
            fail_on_degraded: false,
            requested_by: None,
            api_style: None,
            llm_url: None,
            model: None,
            llm_api_key: None,
            search_api_key: None,
            temperature: None,
            timeout: None,
            stage_timeout: None,
            cache_dir: None,
            validity_hours: None,
            list_cache: false,
            clear_cache: false,
            purge_expired: false,
            invalidate: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_research_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_research_requires_companies_and_industry() {
        let mut args = make_args();
        args.companies.clear();
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.industry = Some("   ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_maintenance_needs_no_subjects() {
        let mut args = make_args();
        args.companies.clear();
        args.industry = None;
        args.list_cache = true;
        assert!(args.is_maintenance());
        assert!(args.validate().is_ok());

        args.list_cache = false;
        args.invalidate = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.temperature = Some(3.0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.stage_timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.validity_hours = Some(u64::MAX);
        assert!(args.validate().is_err());

        args.validity_hours = Some(crate::cache::MAX_VALIDITY_HOURS);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_flat_flags() {
        let args = Args::try_parse_from([
            "marketscout",
            "--industry",
            "Retail",
            "Acme Corp",
            "Globex",
            "--refresh",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.companies, vec!["Acme Corp", "Globex"]);
        assert_eq!(args.industry(), "Retail");
        assert!(args.refresh);
        assert_eq!(args.format, Some(OutputFormat::Json));
    }
}
