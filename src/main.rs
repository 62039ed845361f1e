//! MarketScout - multi-stage AI research reports for companies
//!
//! A CLI tool that runs a fixed pipeline of research stages for each
//! company of a batch, caches finished reports, and writes a combined
//! Markdown or JSON report.
//!
//! Exit codes:
//!   0   - Success
//!   1   - Runtime or configuration error
//!   2   - A stage failed or was skipped and --fail-on-degraded was set
//!   130 - Batch aborted with Ctrl-C

mod batch;
mod cache;
mod cli;
mod clock;
mod config;
mod error;
mod events;
mod models;
mod pipeline;
mod progress;
mod provider;
mod report;
mod stages;

use anyhow::{Context, Result};
use batch::{AbortSignal, BatchCoordinator, BatchRequest, BatchRun, RequestContext};
use cache::{CacheStore, FileCacheStore, Invalidate, MemoryCacheStore};
use cli::{Args, OutputFormat};
use clock::{Clock, SystemClock};
use config::{Config, CONFIG_FILE};
use events::{NullSink, ProgressSink};
use models::{Fingerprint, StageStatus};
use pipeline::PipelineExecutor;
use provider::{ChatClient, LlmProvider, TavilyClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit code for a batch stopped by Ctrl-C.
const EXIT_ABORTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("MarketScout v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .marketscout.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Set TAVILY_API_KEY (and MARKETSCOUT_LLM_API_KEY for the openai style) before running.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run maintenance or a research batch. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = build_cache(&config, clock.clone())?;

    if args.is_maintenance() {
        return run_maintenance(&args, store.as_ref());
    }

    config
        .validate()
        .context("Invalid configuration; nothing was researched")?;

    run_batch(&args, &config, store, clock).await
}

/// Pick the cache backend from the merged configuration.
fn build_cache(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<dyn CacheStore>> {
    let validity = config
        .cache_validity()
        .context("Invalid cache configuration")?;

    if config.cache.enabled {
        debug!("Report cache at {}", config.cache.directory.display());
        Ok(Arc::new(FileCacheStore::new(
            config.cache.directory.clone(),
            validity,
            clock,
        )))
    } else {
        debug!("Report cache kept in memory for this run only");
        Ok(Arc::new(MemoryCacheStore::new(validity, clock)))
    }
}

/// Handle --clear-cache, --purge-expired, --invalidate and --list-cache, in that order.
fn run_maintenance(args: &Args, store: &dyn CacheStore) -> Result<i32> {
    if args.clear_cache {
        let removed = store
            .invalidate(&Invalidate::All)
            .context("Failed to clear the report cache")?;
        println!("🧹 Removed {} cached report(s).", removed);
    }

    if args.purge_expired {
        let removed = store
            .purge_expired()
            .context("Failed to purge expired reports")?;
        println!("🧹 Purged {} expired report(s).", removed);
    }

    if args.invalidate {
        let industry = args.industry();
        for company in &args.companies {
            let fingerprint = Fingerprint::of(company, industry);
            let removed = store
                .invalidate(&Invalidate::One(fingerprint))
                .with_context(|| format!("Failed to invalidate {}", company))?;
            if removed > 0 {
                println!("🗑️  Invalidated {} ({})", company.trim(), industry);
            } else {
                println!("   No cached report for {} ({})", company.trim(), industry);
            }
        }
    }

    if args.list_cache {
        let entries = store.entries().context("Failed to list the report cache")?;
        if entries.is_empty() {
            println!("📭 The report cache is empty.");
        } else {
            println!("📦 {} cached report(s):\n", entries.len());
            for entry in &entries {
                let state = if entry.fresh { "✅ fresh" } else { "⌛ expired" };
                let degraded = if entry.degraded { " ⚠️ degraded" } else { "" };
                println!(
                    "   {} | {} | {} | {}{}",
                    entry.company,
                    entry.industry,
                    entry.created_at.format("%Y-%m-%d %H:%M UTC"),
                    state,
                    degraded
                );
            }
        }
    }

    Ok(0)
}

/// Research every requested company and write the combined report.
async fn run_batch(
    args: &Args,
    config: &Config,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
) -> Result<i32> {
    let start_time = Instant::now();

    println!("🤖 Initializing research pipeline...");
    println!("   Model: {} ({:?})", config.llm.model, config.llm.api_style);
    println!("   LLM endpoint: {}", config.llm.base_url);
    println!("   Stage timeout: {}s", config.pipeline.stage_timeout_seconds);
    println!(
        "   Cache: {}",
        if config.cache.enabled {
            config.cache.directory.display().to_string()
        } else {
            "in-memory".to_string()
        }
    );

    let llm = Arc::new(ChatClient::new(config.chat_config())?);
    debug!("Chat client ready for model {}", llm.model_name());
    let search = Arc::new(TavilyClient::new(config.search_config())?);
    let registry = stages::default_registry(llm, search, config.search.max_results)
        .context("Failed to build the stage registry")?;

    let executor = PipelineExecutor::new(Arc::new(registry), config.stage_timeout(), clock);
    let coordinator = BatchCoordinator::new(executor, store);

    let request = BatchRequest::new(args.companies.clone(), args.industry()).with_context(
        RequestContext {
            bypass_cache: args.refresh,
            requested_by: args.requested_by.clone(),
        },
    );

    let abort = AbortSignal::new();
    let on_interrupt = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⏹️  Interrupt received, stopping after the current company...");
            on_interrupt.abort();
        }
    });

    let sink: Box<dyn ProgressSink> = if args.quiet {
        Box::new(NullSink)
    } else {
        Box::new(progress::ConsoleProgress::new())
    };

    println!(
        "\n🔬 Researching {} compan{} in {}...\n",
        args.companies.len(),
        if args.companies.len() == 1 { "y" } else { "ies" },
        args.industry()
    );

    let batch = coordinator.run(&request, sink.as_ref(), &abort).await?;

    if batch.is_aborted() {
        eprintln!(
            "\n⏹️  Batch aborted after {} of {} compan{}. No report was written.",
            batch.outcomes.len(),
            batch.requested,
            if batch.requested == 1 { "y" } else { "ies" }
        );
        return Ok(EXIT_ABORTED);
    }

    println!("\n📝 Generating report...");
    let format = config.general.format;
    let output = match format {
        OutputFormat::Json => report::generate_json_report(&batch)?,
        OutputFormat::Markdown => report::generate_markdown_report(&batch),
    };

    let path = output_path(args, config);
    std::fs::write(&path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    print_summary(&batch, start_time.elapsed().as_secs_f64());
    println!("\n✅ Research complete! Report saved to: {}", path.display());

    if args.fail_on_degraded && batch.degraded_count() > 0 {
        eprintln!(
            "\n⛔ {} report(s) have failed or skipped stages. Failing (exit code 2).",
            batch.degraded_count()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Output path, with the extension following the format when none was given explicitly.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_some() {
        return path;
    }
    match config.general.format {
        OutputFormat::Json if path.extension().is_some_and(|ext| ext == "md") => {
            path.with_extension("json")
        }
        _ => path,
    }
}

fn print_summary(batch: &BatchRun, duration: f64) {
    println!("\n📊 Research Summary:");
    println!("   Companies: {}", batch.outcomes.len());
    println!("   Served from cache: {}", batch.cached_count());
    println!("   Stage runs: {}", batch.stage_invocations);

    for report in batch.reports() {
        let ok = report.count_with_status(StageStatus::Success);
        let failed = report.count_with_status(StageStatus::Failed);
        let skipped = report.count_with_status(StageStatus::Skipped);
        println!(
            "   - {}: ✅ {} | ❌ {} | ⏭️ {}",
            report.subject.company, ok, failed, skipped
        );
        if report.is_all_failed() {
            warn!("Every stage failed for {}", report.subject);
        }
    }

    println!("   Duration: {:.1}s", duration);
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Report, StageKind, Subject};
    use chrono::Utc;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["marketscout", "--industry", "Retail", "Acme"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_output_path_follows_format() {
        let mut config = Config::default();
        config.general.format = OutputFormat::Json;
        assert_eq!(
            output_path(&args(&[]), &config),
            PathBuf::from("marketscout_report.json")
        );

        let explicit = args(&["--output", "out.md"]);
        config.merge_with_args(&explicit);
        assert_eq!(output_path(&explicit, &config), PathBuf::from("out.md"));
    }

    #[test]
    fn test_build_cache_respects_no_persist() {
        let mut config = Config::default();
        config.merge_with_args(&args(&["--no-persist"]));
        let store = build_cache(&config, Arc::new(SystemClock)).unwrap();

        let report = Report::pending(Subject::new("Acme", "Retail"), &StageKind::ALL, Utc::now());
        let fingerprint = report.subject.fingerprint();
        store.put(&fingerprint, &report).unwrap();
        assert_eq!(store.lookup(&fingerprint).unwrap(), Some(report));
        assert!(!config.cache.directory.join(format!("{}.json", fingerprint.file_stem())).exists());
    }

    #[test]
    fn test_build_cache_rejects_out_of_range_window() {
        let mut config = Config::default();
        config.cache.validity_hours = u64::MAX;
        assert!(build_cache(&config, Arc::new(SystemClock)).is_err());
    }

    #[test]
    fn test_maintenance_on_file_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileCacheStore::new(
            dir.path(),
            cache::validity_window(24).unwrap(),
            Arc::new(SystemClock),
        );
        let report = Report::pending(Subject::new("Acme", "Retail"), &StageKind::ALL, Utc::now());
        store.put(&report.subject.fingerprint(), &report).unwrap();

        let invalidate = args(&["--invalidate", "--list-cache"]);
        assert_eq!(run_maintenance(&invalidate, &store).unwrap(), 0);
        assert!(store.entries().unwrap().is_empty());
    }
}
