use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::FromArgMatches;
use solsync::{Registry, SyncExecutor, SyncReport};
use solsync_api::{SolutionClient, SolutionClientBuilder};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod config;
mod kinds;
mod output;

use args::{Cli, Commands};
use config::ProjectConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<std::ffi::OsString> = std::env::args_os().collect();

    let bootstrap = args::bootstrap(argv.iter().cloned());
    init_basic_logging(&bootstrap.log_level)?;

    let project = std::fs::canonicalize(&bootstrap.project)
        .with_context(|| format!("Project directory {} not found", bootstrap.project.display()))?;
    let config_path = bootstrap
        .config
        .unwrap_or_else(|| args::default_config_path(&project));
    debug!("Using config {}", config_path.display());

    let mut config = ProjectConfig::load(&config_path).await?;
    config.apply_env();
    config.validate()?;

    let client = build_client(&config)?;
    let mut registry = Registry::new();
    kinds::register_builtins(&mut registry, &config, client)?;

    let matches = args::build_command(&registry).get_matches_from(argv);
    let cli = Cli::from_arg_matches(&matches)?;

    run(&cli, &matches, &registry, &config, &project).await
}

async fn run(
    cli: &Cli,
    matches: &clap::ArgMatches,
    registry: &Registry,
    config: &ProjectConfig,
    project: &Path,
) -> Result<()> {
    let (Some(sync_args), Some(options)) = (cli.command.sync_args(), cli.command.options()) else {
        print!("{}", output::render_kinds(registry));
        return Ok(());
    };

    let selection = args::selection(registry, matches, sync_args);
    let ctx = config.context(project);
    let executor = SyncExecutor::new(registry, &ctx);

    let report = match &cli.command {
        Commands::Syncup(_) | Commands::Syncdown(_) => executor.sync(&selection, &options).await?,
        _ => executor.status(&selection, &options).await?,
    };

    print_report(&cli.command, &report, sync_args.json)?;

    let failures = report.failure_count();
    if failures > 0 {
        info!("Finished with {} failure(s)", failures);
    }
    Ok(())
}

fn print_report(command: &Commands, report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match command {
        Commands::Status(_) | Commands::Diff(_) => print!("{}", output::render_status(report)),
        _ => println!("{}", report.summary()),
    }
    Ok(())
}

/// Client for the configured solution; kinds fail to build without one
fn build_client(config: &ProjectConfig) -> Result<Option<Arc<SolutionClient>>> {
    let Some(solution_id) = config.remote.solution_id.as_deref() else {
        return Ok(None);
    };

    let mut builder = SolutionClientBuilder::new(config.remote.url.as_str())
        .solution_id(solution_id)
        .timeout(Duration::from_secs(config.remote.timeout_secs));
    if let Some(token) = &config.remote.token {
        builder = builder.token(token.as_str());
    }

    let client = builder.build().context("Cannot create the solution client")?;
    Ok(Some(Arc::new(client)))
}

fn init_basic_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    // Reports go to stdout; keep logs off it
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(format!(
                "solsync={level},solsync_api={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
