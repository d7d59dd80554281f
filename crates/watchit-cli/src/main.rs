//! CLI entry point for watchit.
//!
//! Each subcommand builds a set of watches, polls them, and prints every
//! event as one JSON line on stdout. Ctrl-C or SIGTERM stops polling.
//!
//! # Usage
//!
//! ```bash
//! watchit [OPTIONS] <COMMAND>
//!
//! # Report every change of a file
//! watchit file ./config.toml
//!
//! # Report when a remote document's Last-Modified changes
//! watchit url https://example.com/feed.xml
//!
//! # Report high CPU or memory use of a process until it exits
//! watchit ps --pid 4242 --cpu 0.8 --mem 1073741824
//!
//! # Poll everything declared in ./Watchfile
//! watchit run
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use watchit_core::Config;
use watchit_watcher::{
    BroadcastTrigger, DEFAULT_WATCHFILE, Dispatcher, PollSummary, ReportTarget, Scheduler, Trigger,
    WatchHandle, Watchfile,
};
use watchit_watches::{
    FileModifiedWatch, HighCpuWatch, HighIoWatch, HighMemWatch, ProcFs, ProcessDeathWatch,
    SystemConstants, UrlModifiedWatch, Watch,
};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Observe files, URLs and processes, and report when they change.
#[derive(Parser)]
#[command(name = "watchit", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file. Missing fields take their defaults.
    #[arg(short, long, global = true, env = "WATCHIT_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Polling interval in seconds (overrides the configuration file).
    #[arg(short, long, global = true, env = "WATCHIT_INTERVAL")]
    interval: Option<u64>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Report modifications of a file.
    File {
        /// File to watch.
        path: Utf8PathBuf,
    },

    /// Report changes of a URL's Last-Modified header.
    Url {
        /// HTTP or HTTPS URL to watch.
        url: String,
    },

    /// Report high CPU or memory use of a process until it exits.
    Ps {
        /// Process to watch.
        #[arg(long)]
        pid: u32,

        /// CPU usage ratio threshold (1.0 is one full core).
        #[arg(long)]
        cpu: Option<f64>,

        /// Resident memory threshold in bytes.
        #[arg(long)]
        mem: Option<u64>,
    },

    /// Report high storage I/O of a process until it exits.
    Io {
        /// Process to watch.
        #[arg(long)]
        pid: u32,

        /// Read or write rate threshold in bytes per second.
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Poll every watch declared in a Watchfile.
    Run {
        /// Watchfile to load.
        #[arg(short, long, default_value = DEFAULT_WATCHFILE)]
        watchfile: Utf8PathBuf,
    },

    /// Check a Watchfile and list what it declares.
    Lint {
        /// Watchfile to check.
        #[arg(short, long, default_value = DEFAULT_WATCHFILE)]
        watchfile: Utf8PathBuf,
    },
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Logs go to stderr so stdout carries only events.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the configuration file and CLI overrides.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(interval) = cli.interval {
        config.scheduler.interval_secs = interval;
    }
    config.validate()?;

    Ok(config)
}

/// Returns a trigger printing each event as a JSON line on stdout.
fn stdout_trigger(config: &Config) -> color_eyre::Result<impl Trigger> {
    let dispatcher = Dispatcher::current(config.scheduler.max_in_flight)?;
    Ok(ReportTarget::Stdout.trigger(dispatcher))
}

/// Fails unless `pid` names a live process.
fn ensure_process(procfs: &ProcFs, pid: u32) -> color_eyre::Result<()> {
    if pid == 0 {
        return Err(eyre!("Invalid pid {pid}"));
    }
    if !procfs.process_exists(pid) {
        return Err(eyre!("No such process with pid {pid}"));
    }
    Ok(())
}

// =============================================================================
// SIGNAL HANDLING
// =============================================================================

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(error) => {
                warn!(error = %error, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Waits for `handle`'s loop to end, cancelling it on a shutdown signal.
async fn wait_for(handle: WatchHandle) -> color_eyre::Result<PollSummary> {
    let canceller = handle.canceller();
    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, stopping");
        canceller.cancel();
    });

    let summary = handle.join().await?;
    signals.abort();

    info!(cycles = summary.cycles, events = summary.events, "Watching finished");
    Ok(summary)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn run_file(config: &Config, path: Utf8PathBuf) -> color_eyre::Result<()> {
    let watch = FileModifiedWatch::new(path.clone()).wrap_err_with(|| format!("Cannot watch {path}"))?;
    info!(path = %path, "Watching file");

    let handle = Scheduler::from_config(&config.scheduler)
        .with_watch(watch)
        .watch(stdout_trigger(config)?)?;
    wait_for(handle).await?;
    Ok(())
}

async fn run_url(config: &Config, url: String) -> color_eyre::Result<()> {
    let http = config.http;
    let target = url.clone();
    // The URL watch issues blocking requests at construction.
    let watch = tokio::task::spawn_blocking(move || UrlModifiedWatch::with_config(target, &http))
        .await?
        .wrap_err_with(|| format!("Cannot watch {url}"))?;
    info!(url = %url, "Watching URL");

    let handle = Scheduler::from_config(&config.scheduler)
        .with_watch(watch)
        .watch(stdout_trigger(config)?)?;
    wait_for(handle).await?;
    Ok(())
}

async fn run_ps(config: &Config, pid: u32, cpu: Option<f64>, mem: Option<u64>) -> color_eyre::Result<()> {
    let procfs = ProcFs::from_config(&config.procfs);
    ensure_process(&procfs, pid)?;
    let constants = SystemConstants::query()?;

    let cpu = cpu.unwrap_or(config.thresholds.cpu_ratio);
    let mem = mem.unwrap_or(config.thresholds.memory_bytes);
    let resources = Scheduler::from_config(&config.scheduler)
        .with_watch(HighCpuWatch::with_system(pid, cpu, procfs.clone(), constants)?)
        .with_watch(HighMemWatch::with_system(pid, mem, procfs.clone(), constants)?)
        .watch(stdout_trigger(config)?)?;
    let death = Scheduler::from_config(&config.scheduler)
        .with_watch(ProcessDeathWatch::with_procfs(pid, procfs).stop_on_death())
        .watch(stdout_trigger(config)?)?;

    info!(pid, cpu, mem, "Watching process resources");
    let resources_canceller = resources.canceller();
    wait_for(death).await?;
    info!(pid, "Process has ended");

    resources_canceller.cancel();
    resources.join().await?;
    Ok(())
}

async fn run_io(config: &Config, pid: u32, threshold: Option<f64>) -> color_eyre::Result<()> {
    let procfs = ProcFs::from_config(&config.procfs);
    ensure_process(&procfs, pid)?;

    let threshold = threshold.unwrap_or(config.thresholds.io_bytes_per_sec);
    let handle = Scheduler::from_config(&config.scheduler)
        .with_watch(HighIoWatch::with_procfs(pid, threshold, procfs.clone()))
        .with_watch(ProcessDeathWatch::with_procfs(pid, procfs).stop_on_death())
        .watch(stdout_trigger(config)?)?;

    info!(pid, threshold, "Watching process I/O");
    wait_for(handle).await?;
    Ok(())
}

async fn run_watchfile(config: &Config, path: Utf8PathBuf) -> color_eyre::Result<()> {
    let watchfile = Watchfile::load(&path)?;
    for (key, value) in &watchfile.properties {
        info!(key = %key, value = %value, "Using property");
    }

    let http = config.http;
    let specs = watchfile.watches.clone();
    // URL watches issue blocking requests at construction.
    let watches: Vec<Box<dyn Watch>> = tokio::task::spawn_blocking(move || {
        specs
            .iter()
            .filter_map(|spec| {
                spec.build(&http)
                    .inspect_err(|error| {
                        warn!(kind = spec.kind(), target = spec.target(), error = %error, "Skipping unusable watch");
                    })
                    .ok()
            })
            .collect::<Vec<_>>()
    })
    .await?;

    if watches.is_empty() {
        return Err(eyre!("No usable watches in {path}"));
    }

    let dispatcher = Dispatcher::current(config.scheduler.max_in_flight)?;
    let trigger: Arc<dyn Trigger> = match watchfile.triggers.as_slice() {
        [] => Arc::new(ReportTarget::Stdout.trigger(dispatcher)),
        [single] => Arc::new(single.build(dispatcher)),
        many => Arc::new(BroadcastTrigger::new(
            many.iter()
                .map(|spec| Arc::new(spec.build(dispatcher.clone())) as Arc<dyn Trigger>),
        )),
    };

    let mut scheduler = Scheduler::from_config(&config.scheduler);
    for watch in watches {
        scheduler.add_watch(watch);
    }
    info!(path = %path, watches = scheduler.len(), "Watching Watchfile");

    let handle = scheduler.watch(trigger)?;
    wait_for(handle).await?;
    Ok(())
}

fn run_lint(path: &Utf8Path) -> color_eyre::Result<()> {
    let watchfile = Watchfile::load(path)?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "{path}: OK")?;
    for spec in &watchfile.watches {
        writeln!(handle, "  watch    {:<14} {}", spec.kind(), spec.target())?;
    }
    for spec in &watchfile.triggers {
        writeln!(handle, "  trigger  {}", spec.target.name())?;
    }
    for (key, value) in &watchfile.properties {
        writeln!(handle, "  property {key}={value}")?;
    }
    if watchfile.is_empty() {
        writeln!(handle, "  (no watches declared)")?;
    }

    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load configuration
    let config = build_config(&cli)?;

    // 5. Route to appropriate command
    match cli.command {
        Commands::File { path } => run_file(&config, path).await,
        Commands::Url { url } => run_url(&config, url).await,
        Commands::Ps { pid, cpu, mem } => run_ps(&config, pid, cpu, mem).await,
        Commands::Io { pid, threshold } => run_io(&config, pid, threshold).await,
        Commands::Run { watchfile } => run_watchfile(&config, watchfile).await,
        Commands::Lint { watchfile } => run_lint(&watchfile),
    }
}
