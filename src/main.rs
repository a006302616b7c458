//! Profile-Harvest main entry point
//!
//! This is the command-line interface for the Profile-Harvest batch engine.

use clap::Parser;
use profile_harvest::config::{apply_env_overrides, load_config_with_hash, validate, Config};
use profile_harvest::harvest::{harvest, plan_pending_batch};
use profile_harvest::output::{load_summary, print_summary};
use profile_harvest::proxy::qualify_proxies;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Profile-Harvest: a resumable profile page harvester
///
/// Profile-Harvest renders profile pages in checkpointed batches, spreading
/// each batch over a direct worker and a pool of proxied workers, and appends
/// the extracted fields to a CSV file.
#[derive(Parser, Debug)]
#[command(name = "profile-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, proxy-aware profile harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Ignore the progress checkpoint and truncate the CSV
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "check_proxies"])]
    fresh: bool,

    /// Show how the next pending batch would be split without rendering
    #[arg(long, conflicts_with_all = ["stats", "check_proxies"])]
    dry_run: bool,

    /// Show statistics from the result CSV and exit
    #[arg(long, conflicts_with_all = ["dry_run", "check_proxies"])]
    stats: bool,

    /// Check the raw proxy list and write the working proxies, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    check_proxies: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = match load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.check_proxies {
        handle_check_proxies(&config).await?;
    } else {
        handle_harvest(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("profile_harvest=info,warn"),
            1 => EnvFilter::new("profile_harvest=debug,info"),
            2 => EnvFilter::new("profile_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file, or the defaults plus environment overrides
fn load(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let mut config = Config::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
            validate(&config)?;
            Ok(config)
        }
    }
}

/// Handles the --dry-run mode: shows the partition of the next pending batch
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Profile-Harvest Dry Run ===\n");

    println!("Input:");
    println!("  Targets: {}", config.input.targets_path.display());
    println!("  Proxies: {}", config.input.proxies_path.display());

    println!("\nOutput:");
    println!("  CSV: {}", config.output.csv_path().display());
    println!("  Progress: {}", config.output.progress_path().display());

    println!("\nBatching:");
    println!("  Batch size: {}", config.batch.batch_size);
    println!("  Desired pool workers: {}", config.batch.desired_pool_workers);
    println!(
        "  Pool workers without proxy: {}",
        config.batch.pool_workers_without_proxy
    );
    println!("  CPU count: {}", config.batch.effective_cpu_count());

    let pending = match plan_pending_batch(config)? {
        Some(p) => p,
        None => {
            println!("\n✓ Configuration is valid");
            println!("✓ Nothing left to process");
            return Ok(());
        }
    };

    println!(
        "\nNext batch {}/{}: targets {}..{} of {} ({} proxies loaded)",
        pending.number,
        pending.total_batches,
        pending.start,
        pending.end,
        pending.total_targets,
        pending.proxies
    );
    println!("  Direct supervisor: {} targets", pending.plan.direct.len());
    for (i, chunk) in pending.plan.chunks.iter().enumerate() {
        let proxy = chunk
            .proxy
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "no proxy".to_string());
        println!("  Pool worker {}: {} targets ({})", i, chunk.len(), proxy);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: summarizes the result CSV
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.output.csv_path();
    let summary = load_summary(&path)?;
    print_summary(&path, &summary);
    Ok(())
}

/// Handles the --check-proxies mode: offline proxy qualification
async fn handle_check_proxies(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Proxy Qualification ===\n");
    println!("Raw list: {}", config.proxy_check.raw_path.display());
    println!("Check URL: {}", config.proxy_check.check_url);
    println!();

    let report = qualify_proxies(&config.proxy_check).await?;

    println!("Checked: {}", report.checked);
    println!("Working: {}", report.working.len());
    println!("Failed: {}", report.failed());
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    if !report.working.is_empty() {
        println!(
            "\n✓ Working proxies saved to: {}",
            config.proxy_check.output_path.display()
        );
    }
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    let csv_path = config.output.csv_path();

    match harvest(config, fresh).await {
        Ok(report) => {
            if report.was_noop() {
                tracing::info!("Nothing to do");
            } else {
                let totals = report.totals();
                tracing::info!(
                    "Harvest completed in {}s: targets {}..{}, {} written, {} dropped",
                    (report.finished_at - report.started_at).num_seconds(),
                    report.start_index,
                    report.end_index,
                    totals.written,
                    totals.dropped + totals.sink_failures
                );
            }
            let summary = load_summary(&csv_path)?;
            print_summary(&csv_path, &summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
