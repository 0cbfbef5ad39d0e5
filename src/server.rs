use std::sync::Arc;

use lumen::api::{self, Dependencies};
use lumen::config::Config;
use lumen::processor::ImageManipulator;
use lumen::storage;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::ServerArgs;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(args: ServerArgs) -> Result<(), AnyError> {
    info!("Loading configuration");
    let mut config = match args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .map_err(|e| format!("Failed to load config: {}", e))?;

    if let Some(address) = args.address {
        config.server.bind_addr = address;
    }

    let storage = storage::from_config(&config.source)
        .map_err(|e| format!("Failed to initialise storage: {}", e))?;
    let manipulator = Arc::new(ImageManipulator::from_config(&config.processor));

    let deps = Dependencies::builder()
        .storage(storage)
        .manipulator(manipulator)
        .build();

    // Nothing is bound until both capabilities are in place
    let app = api::build(&deps, &config)?;

    let address = config.server.bind_addr;
    let listener = TcpListener::bind(address).await?;
    info!(%address, "Lumen listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
