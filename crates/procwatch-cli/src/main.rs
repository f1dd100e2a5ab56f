use anyhow::{anyhow, bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use procwatch_cli::{
    config::Config,
    display::{render_stats, render_table, TerminalDisplay},
    logging::init_logging,
    Command, CommandInput, Scheduler,
};
use procwatch_core::{
    ExportFormat, Exporter, ProcessExecutor, ProcessFilter, ProcessMonitor, SortKey, SortSpec,
    StatsCollector, VERSION,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "procwatch")]
#[command(author = "procwatch developers")]
#[command(version = VERSION)]
#[command(about = "Interactive process monitor", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "procwatch.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked process list once
    List {
        /// Sort key (pid, name, user, cpu, memory, status, started)
        #[arg(short, long)]
        sort: Option<String>,

        /// Sort ascending
        #[arg(long, conflicts_with = "desc")]
        asc: bool,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Case-insensitive pattern over name and user
        #[arg(short, long)]
        filter: Option<String>,

        /// Show at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print CPU, memory, disk and process count once
    Stats,

    /// Live view with line commands (default)
    Watch {
        /// Process list refresh interval in seconds
        #[arg(long)]
        refresh_secs: Option<u64>,

        /// Stats panel refresh interval in seconds
        #[arg(long)]
        stats_secs: Option<u64>,
    },

    /// Send SIGTERM to a process
    Kill {
        pid: u32,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Write a ranked snapshot to a timestamped file
    Export {
        /// json or csv
        format: String,

        /// Directory to write into (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    GenerateConfig {
        #[arg(short, long, default_value = "procwatch.toml")]
        output: PathBuf,
    },

    /// Print a shell completion script
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "procwatch", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::GenerateConfig { output }) => return generate_config(output),
        _ => {}
    }

    let config = load_config(&cli.config)?;
    let _guard = init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Some(Commands::List {
            sort,
            asc,
            desc,
            filter,
            limit,
        }) => list(&config, sort.as_deref(), direction(asc, desc), filter.as_deref(), limit),
        Some(Commands::Stats) => stats(&config),
        Some(Commands::Watch {
            refresh_secs,
            stats_secs,
        }) => watch(config, refresh_secs, stats_secs).await,
        Some(Commands::Kill { pid, yes }) => kill(pid, yes),
        Some(Commands::Export { format, output_dir }) => export(config, &format, output_dir),
        None => watch(config, None, None).await,
        Some(Commands::Completions { .. }) | Some(Commands::GenerateConfig { .. }) => Ok(()),
    }
}

/// Missing file means defaults; a file that exists must parse and validate
fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load_from_file(path)
            .map_err(|e| anyhow!("Failed to load config {}: {}", path.display(), e))?
    } else {
        Config::default()
    };

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration in {}: {}", path.display(), e))?;

    Ok(config)
}

fn build_monitor(config: &Config) -> Result<ProcessMonitor> {
    let sort = config.sort_spec().map_err(|e| anyhow!(e))?;

    Ok(ProcessMonitor::new()
        .with_sort(sort)
        .with_policy(config.sort.policy)
        .with_stats_collector(StatsCollector::for_disk_path(&config.monitoring.disk_path))
        .with_exporter(Exporter::new(&config.export.output_dir)))
}

fn direction(asc: bool, desc: bool) -> Option<bool> {
    match (asc, desc) {
        (true, _) => Some(false),
        (_, true) => Some(true),
        _ => None,
    }
}

fn list(
    config: &Config,
    sort: Option<&str>,
    descending: Option<bool>,
    filter: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    // Reject bad input before touching the process table
    let filter = filter.map(ProcessFilter::new).transpose()?;
    let configured = config.sort_spec().map_err(|e| anyhow!(e))?;
    let spec = match sort {
        Some(key) => {
            let key: SortKey = key.parse()?;
            SortSpec::new(key, descending.unwrap_or_else(|| key.default_descending()))
        }
        None => SortSpec::new(configured.key, descending.unwrap_or(configured.descending)),
    };

    let monitor = build_monitor(config)?.with_sort(spec);
    monitor.prime();

    let mut records = monitor.snapshot();
    if let Some(filter) = &filter {
        records = filter.apply(records);
    }

    print!(
        "{}",
        render_table(
            &records,
            spec,
            config.display.name_width,
            limit.unwrap_or(usize::MAX),
        )
    );
    println!(
        "{}",
        format!("{} processes, sorted by {}", records.len(), spec).dimmed()
    );

    Ok(())
}

fn stats(config: &Config) -> Result<()> {
    let monitor = build_monitor(config)?;

    // The first collection only sets the CPU baseline
    monitor.collect_stats();
    monitor.prime();

    print!("{}", render_stats(&monitor.collect_stats()));
    Ok(())
}

async fn watch(config: Config, refresh_secs: Option<u64>, stats_secs: Option<u64>) -> Result<()> {
    let refresh_every = refresh_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.refresh_interval());
    let stats_every = stats_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.stats_interval());

    if refresh_every.is_zero() || stats_every.is_zero() {
        bail!("Refresh intervals must be > 0");
    }

    let monitor = Arc::new(build_monitor(&config)?);
    let primer = Arc::clone(&monitor);
    tokio::task::spawn_blocking(move || primer.prime())
        .await
        .context("CPU priming task panicked")?;

    let (tx, rx) = mpsc::channel(8);
    spawn_stdin_reader(tx);

    let mut display = TerminalDisplay::new(config.display.name_width, config.display.max_rows);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    Scheduler::new(monitor, refresh_every, stats_every)
        .run(&mut display, rx, shutdown)
        .await?;

    println!();
    Ok(())
}

/// Forward stdin lines as parsed commands
///
/// Runs on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<CommandInput>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if tx.blocking_send(Command::parse(&line)).is_err() {
                break;
            }
        }
    });
}

fn kill(pid: u32, yes: bool) -> Result<()> {
    if !yes && !confirm(&format!("Send SIGTERM to process {}?", pid))? {
        println!("{}", "Cancelled".yellow());
        return Ok(());
    }

    if ProcessExecutor::terminate(pid) {
        println!("{}", format!("✅ Sent SIGTERM to process {}", pid).green());
        Ok(())
    } else {
        bail!("Failed to terminate process {}", pid)
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn export(mut config: Config, format: &str, output_dir: Option<PathBuf>) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    if let Some(dir) = output_dir {
        config.export.output_dir = dir;
    }

    let monitor = build_monitor(&config)?;
    monitor.prime();

    let path = monitor
        .export_snapshot(format)
        .with_context(|| format!("Failed to export {} snapshot", format))?;

    info!("Export written to {}", path.display());
    println!("{}", path.display());
    Ok(())
}

fn generate_config(output: &Path) -> Result<()> {
    Config::default()
        .save_to_file(output)
        .map_err(|e| anyhow!("Failed to write {}: {}", output.display(), e))?;

    println!("{}", format!("✅ Configuration written to {}", output.display()).green());
    Ok(())
}
