use clap::Parser;
use exptrack::api::start_api_server;
use exptrack::cli::{self, Cli, Commands};
use exptrack::client::ApiClient;
use exptrack::config::{AppConfig, LoggingConfig};
use exptrack::error::{Result, TrackerError};
use exptrack::store::ExperimentStore;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::List {
            status,
            user,
            skip,
            limit,
        }) => {
            init_logging_simple();
            let client = ApiClient::new(&cli.url)?;
            cli::list_experiments(&client, status.as_deref(), user.as_deref(), *skip, *limit)
                .await?;
        }
        Some(Commands::Show { id }) => {
            init_logging_simple();
            let client = ApiClient::new(&cli.url)?;
            cli::show_experiment(&client, *id).await?;
        }
        Some(Commands::Compare { ids }) => {
            init_logging_simple();
            let client = ApiClient::new(&cli.url)?;
            cli::compare_experiments(&client, ids).await?;
        }
        Some(Commands::Delete { id }) => {
            init_logging_simple();
            let client = ApiClient::new(&cli.url)?;
            cli::delete_experiment(&client, *id).await?;
        }
        Some(Commands::Health) => {
            init_logging_simple();
            let client = ApiClient::new(&cli.url)?;
            cli::check_health(&client).await?;
        }
        Some(Commands::Serve) | None => {
            run_server(&cli).await?;
        }
    }

    Ok(())
}

/// Run the HTTP API server until shutdown
async fn run_server(cli: &Cli) -> Result<()> {
    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for err in &errors {
            error!("Config error: {}", err);
        }
        return Err(TrackerError::Validation(errors.join("; ")));
    }

    info!("Starting exptrack API server");

    let store = ExperimentStore::new(&config.database.url, config.database.max_connections).await?;
    store.init_schema().await?;

    let store = Arc::new(store);
    let addr = config.server.bind_addr();

    tokio::select! {
        result = start_api_server(store, &addr) => result?,
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server");
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},exptrack=debug,sqlx=warn", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
