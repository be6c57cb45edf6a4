mod handlers;
mod state;
mod telemetry;

use std::process::ExitCode;

use loancall::config::{default_config_path, load_config_or_default};
use loancall::{Config, Database};
use tracing::{error, info, warn};

use state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "loancall-server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting loancall-server");

    let config = match default_config_path() {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            load_config_or_default(&path)?
        }
        None => {
            warn!("Could not determine config path, using defaults");
            Config::default()
        }
    };

    let db_path = config
        .server
        .resolved_database_path()
        .ok_or("Could not determine database path")?;
    let db = Database::open(&db_path)?;
    let state = AppState::from_config(&config, &db)?;

    if config.processing.recover_on_startup {
        let pipeline = state.pipeline.clone();
        tokio::spawn(async move {
            match pipeline.recover_stalled().await {
                Ok(report) => info!(
                    attempted = report.attempted,
                    completed = report.completed,
                    failed = report.failed,
                    skipped = report.skipped,
                    errors = report.errors,
                    "Stalled call sweep finished"
                ),
                Err(e) => warn!(error = %e, "Stalled call sweep failed"),
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, handlers::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
