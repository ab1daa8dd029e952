use crate::{
    commands::{BatchCommand, Commands, GlobalArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use spark_config::{Config, EnvManager};
use std::{path::Path, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod batch;
mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "spark", version, about = "Client for Spark async batch pipelines")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Initialize logger
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli, &shutdown).await {
        Ok(()) if shutdown.is_shutdown_requested() => ExitCode::ShutdownRequested,
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => ExitCode::ShutdownRequested,
        Err(err) => {
            error!("{err}");
            if shutdown.is_shutdown_requested() {
                ExitCode::ShutdownRequested
            } else {
                ExitCode::GeneralError
            }
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let as_json = cli.global.json;
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Batch { command } => match command {
            BatchCommand::Run(args) => {
                let shutdown = shutdown.clone();
                let report =
                    tokio::task::spawn_blocking(move || batch::run(config, args, shutdown)).await??;
                output::print_run(&report, as_json)?;
                if report.summary.cancelled {
                    return Err(CliError::ShutdownRequested);
                }
            }
            command => {
                let response =
                    tokio::task::spawn_blocking(move || batch::execute(config, command)).await??;
                output::print_response(&response, as_json)?;
            }
        },
    }

    Ok(())
}

/// Flags first, then the env file (`.env` when present), then the process
/// environment.
fn load_config(args: &GlobalArgs) -> Result<Config, CliError> {
    let mut env = EnvManager::new();
    match &args.env_file {
        Some(path) => env.load_from_file(path)?,
        None if Path::new(".env").is_file() => env.load_from_file(".env")?,
        None => {}
    }

    let mut builder = Config::builder();
    if let Some(url) = &args.base_url {
        builder = builder.with_base_url(url);
    }
    if let Some(tenant) = &args.tenant {
        builder = builder.with_tenant(tenant);
    }
    if let Some(key) = &args.api_key {
        builder = builder.with_api_key(key);
    }
    if let Some(token) = &args.token {
        builder = builder.with_token(token);
    }
    if let Some(ms) = args.timeout {
        builder = builder.with_timeout(Duration::from_millis(ms));
    }
    if let Some(retries) = args.max_retries {
        builder = builder.with_max_retries(retries);
    }

    Ok(builder.with_env(&env).build()?)
}
