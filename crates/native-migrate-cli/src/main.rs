//! native-migrate CLI - concurrent native-format time-series migration.

mod prompt;

use clap::{Parser, Subcommand};
use native_migrate::{Config, EndpointHealth, MigrateError, NativeClient, Orchestrator, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use prompt::DialoguerPrompt;

#[derive(Parser)]
#[command(name = "native-migrate")]
#[command(about = "Migrate time series between native export/import endpoints")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Never ask for confirmation
    #[arg(short, long)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a migration
    Run {
        /// Override number of concurrent shard transfers
        #[arg(long)]
        concurrency: Option<usize>,

        /// Override write rate limit in bytes per second (0 disables)
        #[arg(long)]
        rate_limit: Option<u64>,

        /// Migrate tenant-by-tenant between clusters
        #[arg(long)]
        intercluster: bool,

        /// Override the window start (RFC3339)
        #[arg(long)]
        time_start: Option<String>,

        /// Override the window end (RFC3339)
        #[arg(long)]
        time_end: Option<String>,

        /// Override the chunk unit: minute, hour, day, week, month, year
        #[arg(long)]
        chunk: Option<String>,

        /// Override the series selector
        #[arg(long = "match")]
        match_expr: Option<String>,

        /// Dry run: discover and plan without transferring data
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe source and destination endpoints
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    // Validated once the command's overrides are applied.
    let mut config = Config::load_unvalidated(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let source = Arc::new(NativeClient::new(config.source.addr.clone())?);
    let destination = Arc::new(NativeClient::new(config.destination.addr.clone())?);

    match cli.command {
        Commands::Run {
            concurrency,
            rate_limit,
            intercluster,
            time_start,
            time_end,
            chunk,
            match_expr,
            dry_run,
        } => {
            // Apply overrides
            if let Some(cc) = concurrency {
                config.migration.concurrency = cc;
            }
            if let Some(rate) = rate_limit {
                config.migration.rate_limit = rate;
            }
            if intercluster {
                config.migration.intercluster = true;
            }
            if let Some(start) = time_start {
                config.filter.time_start = start;
            }
            if let Some(end) = time_end {
                config.filter.time_end = Some(end);
            }
            if let Some(chunk) = chunk {
                config.filter.chunk = Some(chunk);
            }
            if let Some(expr) = match_expr {
                config.filter.match_expr = expr;
            }
            config.validate()?;

            let cancel_token = setup_signal_handler()?;

            let orchestrator = Orchestrator::new(config, source, destination)
                .with_prompt(Arc::new(DialoguerPrompt))
                .silent(cli.silent)
                .dry_run(dry_run);

            let result = orchestrator.run(&cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                let status_msg = match result.status {
                    RunStatus::Completed => "Migration completed!",
                    RunStatus::DryRun => "Dry run completed!",
                    RunStatus::Declined => "Migration declined.",
                };
                println!("\n{}", status_msg);
                println!("  Run ID: {}", result.run_id);
                println!("  Tenants: {}", result.tenants.len());
                println!("  Shards: {}", result.shards_planned);
                println!("  {}", result.stats.to_string().replace('\n', "\n  "));
            }
        }

        Commands::HealthCheck => {
            config.validate()?;

            let orchestrator = Orchestrator::new(config, source, destination);
            let report = orchestrator.health_check().await;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                println!("Health Check Results:");
                print_health("Source", &report.source);
                print_health("Destination", &report.destination);
            }

            report.into_result()?;
        }
    }

    Ok(())
}

fn print_health(role: &str, endpoint: &EndpointHealth) {
    match &endpoint.result {
        Ok(()) => println!("  {} ({}): OK", role, endpoint.addr),
        Err(e) => println!("  {} ({}): FAILED\n    Error: {}", role, endpoint.addr, e),
    }
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity {:?}", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format {:?}", other)),
    }

    Ok(())
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping new transfers and waiting for workers...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping new transfers and waiting for workers...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
