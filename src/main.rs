//! evtrack CLI
//!
//! Replays recorded interaction streams through the tracking pipeline.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use evtrack::{
    config::{Config, ConfigOverrides, LayoutType, SourceConfig},
    host::{Host, PageMetrics, StaticMetrics},
    transport::{MemoryTransport, Transport},
    ReplaySource, SamplingMode, Tracker, VERSION,
};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evtrack")]
#[command(version = VERSION)]
#[command(about = "Client-side activity tracking pipeline", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON Lines event stream through the pipeline
    Run {
        /// Event stream to read (stdin if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Collector address
        #[arg(long)]
        server: Option<String>,

        /// Batch interval in seconds
        #[arg(long)]
        interval: Option<f64>,

        /// Sampling gate (0 records everything)
        #[arg(long)]
        sampling: Option<f64>,

        /// Interpret --sampling as a rate in Hz instead of a gap in milliseconds
        #[arg(long)]
        hertz: bool,

        /// Task name sent with the init request
        #[arg(long)]
        task: Option<String>,

        /// Layout type (left, right, center or liquid)
        #[arg(long)]
        layout: Option<LayoutType>,

        /// Event categories to capture (mouse, touch, key, window, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Page metrics as a JSON object
        #[arg(long)]
        metrics: Option<String>,

        /// Replay with the recorded timing instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Log requests instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configuration
    Config {
        /// Write the loaded configuration back to the config file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Could not load configuration")?;

    init_logging(config.debug);

    match cli.command {
        Commands::Run {
            input,
            server,
            interval,
            sampling,
            hertz,
            task,
            layout,
            sources,
            metrics,
            realtime,
            dry_run,
        } => {
            let overrides = ConfigOverrides {
                post_server: server,
                post_interval: interval,
                sampling_freq: sampling,
                sampling_mode: hertz.then_some(SamplingMode::Hertz),
                task_name: task,
                layout_type: layout,
                sources: sources.as_deref().map(SourceConfig::from_csv),
                ..Default::default()
            };
            cmd_run(&config, &overrides, input, metrics, realtime, dry_run)
        }
        Commands::Config { write } => cmd_config(&config, cli.config, write),
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    config: &Config,
    overrides: &ConfigOverrides,
    input: Option<PathBuf>,
    metrics: Option<String>,
    realtime: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    println!("evtrack v{VERSION}");

    let page_metrics: PageMetrics = match metrics {
        Some(json) => serde_json::from_str(&json).context("Invalid --metrics JSON")?,
        None => PageMetrics::default(),
    };

    let mut source = match input {
        Some(ref path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Could not open {}", path.display()))?;
            ReplaySource::new(BufReader::new(file))
        }
        None => ReplaySource::new(BufReader::new(std::io::stdin())),
    }
    .realtime(realtime);

    let transport = create_transport(config, overrides, dry_run)?;

    let mut tracker = Tracker::start(
        config,
        overrides,
        Host::new(StaticMetrics(page_metrics)),
        transport,
        &mut source,
    )?;

    let effective = tracker.pipeline().config();
    println!("  Collector: {}", display_server(effective, dry_run));
    println!("  Interval: {}s", effective.post_interval.as_secs_f64());
    println!(
        "  Sampling: {} ({:?})",
        effective.sampling_freq, effective.sampling_mode
    );
    println!("  Task: {} | Layout: {}", effective.task_name, effective.layout_type);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let reason = tracker.run(&running);
    println!();
    println!("Stopped ({reason:?})");
    println!("{}", tracker.stats().summary());
    Ok(())
}

fn display_server(config: &Config, dry_run: bool) -> String {
    if dry_run {
        "dry run (requests are logged)".to_string()
    } else {
        config.post_server.clone()
    }
}

/// Create the transport from CLI flags and configuration.
fn create_transport(
    config: &Config,
    overrides: &ConfigOverrides,
    dry_run: bool,
) -> anyhow::Result<Arc<dyn Transport>> {
    if dry_run {
        return Ok(Arc::new(MemoryTransport::new().logging()));
    }

    let server = overrides
        .post_server
        .clone()
        .unwrap_or_else(|| config.post_server.clone());
    if server.trim().is_empty() {
        bail!("No collector address configured; pass --server or use --dry-run");
    }

    http_transport(server)
}

#[cfg(feature = "http")]
fn http_transport(server: String) -> anyhow::Result<Arc<dyn Transport>> {
    let transport = evtrack::HttpTransport::new(server)?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn http_transport(server: String) -> anyhow::Result<Arc<dyn Transport>> {
    bail!("Cannot post to {server}: built without the http feature; use --dry-run")
}

fn cmd_config(config: &Config, path: Option<PathBuf>, write: bool) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        path.clone().unwrap_or_else(Config::config_path)
    );
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );

    if write {
        match path {
            Some(ref path) => config.save_to(path),
            None => config.save(),
        }
        .context("Could not write configuration")?;
        println!();
        println!("Configuration written.");
    }
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
