mod config;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use creds_api::CredsApiError;
use creds_api::client::{ClientError, CredsClient};
use creds_api::config::{DEFAULT_COLLECTION_PATH, ValidationError};
use creds_api::request::ProxyEvent;
use metrics_exporter_statsd::StatsdBuilder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "accountly";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(version, about = "Per-account credential store")]
struct Cli {
    #[arg(long, global = true, default_value = "accountly.yaml")]
    config_file_path: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the HTTP API and the admin endpoints
    Serve,
    /// Handle one API gateway proxy event and print the result
    Invoke {
        /// Event JSON file; stdin when omitted
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Call a running API; the config file is not read
    Client {
        /// Deployment URL, e.g. https://api.example.com/prod
        #[arg(long)]
        base_url: String,
        #[arg(long, default_value = DEFAULT_COLLECTION_PATH)]
        collection_path: String,
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Store or replace one service's credential
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        password: String,
        /// Username stored with the credential; the account name when omitted
        #[arg(long)]
        cred_username: Option<String>,
    },
    /// List an account's services without secrets
    List {
        #[arg(long)]
        username: String,
    },
    /// Fetch one service's credential
    Get {
        #[arg(long)]
        username: String,
        #[arg(long)]
        service: String,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] ValidationError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid event: {0}")]
    Event(#[from] serde_json::Error),
    #[error(transparent)]
    Service(#[from] CredsApiError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            eprintln!("accountly: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        CliCommand::Serve => {
            let (config, _sentry) = load_config(&cli.config_file_path)?;
            tracing::info!("Starting accountly");
            tokio::runtime::Runtime::new()?.block_on(creds_api::run(config.creds_api))?;
        }
        CliCommand::Invoke { event } => {
            let (config, _sentry) = load_config(&cli.config_file_path)?;
            let event = read_event(event.as_deref())?;
            let result = tokio::runtime::Runtime::new()?
                .block_on(creds_api::handle_event(event, &config.creds_api));
            println!("{}", serde_json::to_string(&result)?);
        }
        CliCommand::Client {
            base_url,
            collection_path,
            action,
        } => {
            let _sentry = init_logging(None);
            let client = CredsClient::with_collection_path(&base_url, &collection_path);
            let output = tokio::runtime::Runtime::new()?.block_on(run_client(&client, action))?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Loads and validates the config, then sets up logging and metrics from it.
fn load_config(path: &Path) -> Result<(Config, Option<sentry::ClientInitGuard>), CliError> {
    let config = Config::from_file(path)?;
    config.creds_api.validate()?;

    let sentry = init_logging(config.logging.as_ref());
    if let Some(metrics) = &config.metrics {
        init_metrics(metrics)?;
    }

    Ok((config, sentry))
}

async fn run_client(client: &CredsClient, action: ClientAction) -> Result<serde_json::Value, CliError> {
    let output = match action {
        ClientAction::Add {
            username,
            service,
            password,
            cred_username,
        } => serde_json::to_value(
            client
                .add_credential(&username, &service, &password, cred_username.as_deref())
                .await?,
        )?,
        ClientAction::List { username } => {
            serde_json::to_value(client.list_services(&username).await?)?
        }
        ClientAction::Get { username, service } => {
            serde_json::to_value(client.get_credential(&username, &service).await?)?
        }
    };

    Ok(output)
}

/// Logs go to stderr so `invoke` output stays machine readable.
fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = config
            .and_then(|c| c.filter.as_deref())
            .unwrap_or(DEFAULT_LOG_FILTER);
        EnvFilter::new(directives)
    });

    let guard = config.and_then(|c| c.sentry_dsn.as_deref()).map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(creds_api::metrics_defs::ALL_METRICS);

    tracing::info!(host = %config.statsd_host, port = config.statsd_port, "Metrics enabled");
    Ok(())
}

fn read_event(path: Option<&Path>) -> Result<ProxyEvent, CliError> {
    let data = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut data = String::new();
            std::io::stdin().read_to_string(&mut data)?;
            data
        }
    };

    Ok(serde_json::from_str(&data)?)
}
