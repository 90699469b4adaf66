//! metabee - course marketplace backend
//!
//! This is the main entry point for the metabee API server.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use metabee::auth::AuthManager;
use metabee::config::Config;
use metabee::database::SqliteDatabase;
use metabee::server::{AppState, Server};
use metabee::telemetry::init_tracing;

/// metabee - course marketplace backend
#[derive(Parser, Debug)]
#[command(name = "metabee")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "METABEE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Replace the password of an existing account
    ResetPassword {
        /// Email of the account
        email: String,

        /// New password
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_tracing(&config.logging.level, &config.logging.format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting metabee");

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    let auth_manager = Arc::new(AuthManager::from_config(database, &config.auth)?);
    info!(
        token_ttl_secs = config.auth.token_ttl_secs,
        "Authentication manager initialized"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, auth_manager).await,
        Command::ResetPassword { email, password } => {
            auth_manager.reset_password(&email, &password).await?;
            info!(email = %email, "Password reset");
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    auth_manager: Arc<AuthManager<SqliteDatabase>>,
) -> anyhow::Result<()> {
    let server = Server::new(config.server.clone(), AppState::new(auth_manager))
        .with_cors(config.cors.clone());

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;
    if let Err(e) = &result {
        error!(error = %e, "Server stopped with an error");
    }

    info!("metabee shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // tracing is not initialized yet
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Resolves when Ctrl+C or SIGTERM is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
