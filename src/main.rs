//! SirenWatch - channel chatter watcher
//!
//! Polls monitored channels, batches bursts of new messages, asks an AI
//! classifier whether the situation changed and relays the verdict.
//!
//! # Usage
//!
//! ```bash
//! # Run with ./sirenwatch.toml (or $SIRENWATCH_CONFIG, or defaults)
//! cargo run --release
//!
//! # Log verdicts instead of posting them
//! cargo run --release -- --dry-run
//!
//! # Check a config file and exit
//! cargo run --release -- validate-config --config sirenwatch.toml
//! ```
//!
//! # Environment Variables
//!
//! - `SIRENWATCH_CONFIG`: Path to the TOML config
//! - `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `DEEPSEEK_API_KEY`, `GEMINI_API_KEY`,
//!   `GLM_API_KEY`, `OPENROUTER_API_KEY`: provider key when `classifier.api_key` is empty
//! - `TELEGRAM_BOT_TOKEN`: relay token when `relay.bot_token` is empty
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use sirenwatch::batch::BatchScheduler;
use sirenwatch::config::{defaults, validation, WatchConfig};
use sirenwatch::cursor::CursorTracker;
use sirenwatch::gate::build_gate;
use sirenwatch::pipeline::{FlushWorker, GatePolicy, PipelineCoordinator, PipelineStats};
use sirenwatch::preamble::{run_preamble_watcher, watcher::WatcherTiming, Preamble};
use sirenwatch::relay::build_relay;
use sirenwatch::source::HttpFeedSource;

/// How long shutdown waits for tasks to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sirenwatch")]
#[command(about = "Debounced AI classification of channel chatter with alert relay")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config (overrides $SIRENWATCH_CONFIG and ./sirenwatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verdicts instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Parse and validate the config, print warnings and errors, then exit
    ValidateConfig,
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    Coordinator,
    BatchScheduler,
    FlushWorker,
    PreambleWatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Coordinator => write!(f, "Coordinator"),
            TaskName::BatchScheduler => write!(f, "BatchScheduler"),
            TaskName::FlushWorker => write!(f, "FlushWorker"),
            TaskName::PreambleWatcher => write!(f, "PreambleWatcher"),
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {:#}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Wait for cancelled tasks to finish so their final logs are written.
async fn drain_tasks(task_set: &mut JoinSet<Result<TaskName>>) {
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(result) = task_set.join_next().await {
            match result {
                Ok(Ok(name)) => info!("Supervisor: task {} stopped", name),
                Ok(Err(e)) => warn!("Supervisor: task stopped with error: {:#}", e),
                Err(e) => warn!("Supervisor: task panicked during shutdown: {}", e),
            }
        }
    })
    .await;

    if drained.is_err() {
        warn!("Supervisor: tasks still running after {:?}, aborting", SHUTDOWN_GRACE);
        task_set.abort_all();
    }
}

// ============================================================================
// Pipeline Runner
// ============================================================================

async fn run_pipeline(config: WatchConfig, dry_run: bool, cancel_token: CancellationToken) -> Result<()> {
    let preamble_path = config.classifier.preamble_path.clone();
    let preamble = Arc::new(
        Preamble::load_from_file(&preamble_path).context("Failed to load classifier preamble")?,
    );

    let classifier = sirenwatch::build_classifier(&config.classifier, Arc::clone(&preamble), cancel_token.clone())
        .context("Failed to build classifier")?;
    let relay = build_relay(&config.relay, dry_run, cancel_token.clone()).context("Failed to build relay")?;
    let gate = build_gate(&config.gate).context("Failed to build gate")?;
    let source = Arc::new(
        HttpFeedSource::new(
            &config.sources.feed_url,
            Duration::from_secs(config.sources.request_timeout_secs),
        )
        .context("Failed to build message source")?,
    );

    let cursor = Arc::new(CursorTracker::new());
    let stats = Arc::new(PipelineStats::new());

    let (scheduler, handle, flush_rx) = BatchScheduler::new(
        config.batch.window(),
        defaults::SCHEDULER_CHANNEL_SIZE,
        cancel_token.clone(),
    );

    info!("Supervisor: initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: Batch scheduler
    task_set.spawn(async move {
        let _stats = scheduler.run().await;
        Ok(TaskName::BatchScheduler)
    });

    // Task 2: Flush worker
    let worker = FlushWorker::new(
        classifier,
        relay,
        config.relay.channel.clone(),
        Arc::clone(&stats),
        cancel_token.clone(),
    );
    task_set.spawn(async move {
        worker.run(flush_rx).await;
        Ok(TaskName::FlushWorker)
    });

    // Task 3: Coordinator
    let coordinator = PipelineCoordinator::new(
        &config.sources,
        source,
        gate,
        GatePolicy::from(&config.gate),
        cursor,
        handle,
        Arc::clone(&stats),
        cancel_token.clone(),
    );
    task_set.spawn(async move {
        coordinator.run().await.context("Coordinator lost the batch scheduler")?;
        Ok(TaskName::Coordinator)
    });

    // Task 4: Preamble watcher
    let watcher_cancel = cancel_token.clone();
    task_set.spawn(async move {
        run_preamble_watcher(preamble_path, preamble, WatcherTiming::default(), watcher_cancel).await;
        Ok(TaskName::PreambleWatcher)
    });

    let result = run_supervisor(&mut task_set, cancel_token).await;
    drain_tasks(&mut task_set).await;

    info!("{}", stats.snapshot());
    result
}

// ============================================================================
// Config Validation Subcommand
// ============================================================================

fn validate_config(explicit: Option<&std::path::Path>) -> Result<()> {
    let Some(path) = WatchConfig::locate(explicit) else {
        println!("No config file found; built-in defaults would be used.");
        return Ok(());
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let unknown = validation::validate_unknown_keys(&raw);
    let parsed: WatchConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let (errors, warnings) = validation::validate_ranges(&parsed);

    println!("Config: {}", path.display());
    for w in unknown.iter().chain(warnings.iter()) {
        println!("  warning: {}", w);
    }
    for e in &errors {
        println!("  error: {}", e);
    }

    if errors.is_empty() {
        println!("OK");
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} config error(s)", errors.len()))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    if let Some(SubCommand::ValidateConfig) = args.command {
        return validate_config(args.config.as_deref());
    }

    let config = WatchConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    info!(
        "Sources: {} | Provider: {} | Relay: {} | Window: {}s +{}s",
        config.sources.channels.join(", "),
        config.classifier.provider,
        if args.dry_run { "log (dry-run)".to_string() } else { format!("{:?}", config.relay.mode) },
        config.batch.base_window_secs,
        config.batch.extend_by_secs,
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    run_pipeline(config, args.dry_run, cancel_token).await?;

    info!("SirenWatch shutdown complete");
    Ok(())
}
