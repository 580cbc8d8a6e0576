//! Searchlight service binary.

use anyhow::{Context, Result};
use searchlight_core::AppConfig;
use searchlight_crawler::{HttpFetcher, PageFetcher};
use searchlight_db::Database;
use searchlight_geo::GeoAnalyzer;
use searchlight_runner::{
    BatchRunner, ContinuationTrigger, HttpContinuation, RunnerSettings, SweepLoop, SweepPolicy,
};
use searchlight_server::{build_router, telemetry, ApiSettings, AppState};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = AppConfig::load_with_env().context("Failed to load configuration")?;
    info!(version = env!("CARGO_PKG_VERSION"), bind = %config.server.bind, "Starting Searchlight");

    let db = Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to open database")?;
    db.run_migrations().await.context("Failed to run migrations")?;
    let db = Arc::new(db);
    info!(url = %config.database.url, "Database ready");

    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::new(&config.crawler).context("Failed to build page fetcher")?);
    let provider =
        searchlight_llm::provider_from_config(&config.llm).context("Invalid LLM configuration")?;
    let geo = GeoAnalyzer::from_config(&config.llm, provider);
    info!(llm = geo.uses_llm(), "GEO analyzer ready");

    let settings = RunnerSettings::from_config(&config.runner, &config.crawler);
    let runner = match config.server.continuation_secret.as_deref() {
        Some(secret) => {
            let trigger: Arc<dyn ContinuationTrigger> = Arc::new(
                HttpContinuation::new(&config.server.public_base_url, secret)
                    .context("Failed to build continuation trigger")?,
            );
            info!(base_url = %config.server.public_base_url, "Continuations over HTTP");
            Arc::new(BatchRunner::new(db.clone(), fetcher, Some(geo), trigger, settings))
        }
        None => {
            warn!("No continuation secret configured, continuations run in-process");
            BatchRunner::in_process(db.clone(), fetcher, Some(geo), settings)
        }
    };

    let cancel = CancellationToken::new();
    let sweeper = SweepLoop::new(
        db.clone(),
        SweepPolicy::from_config(&config.runner),
        runner.trigger().clone(),
        config.runner.sweep_interval(),
    )
    .spawn(cancel.clone());

    let state = AppState::new(db.clone(), runner, ApiSettings::from_config(&config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!(address = %config.server.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        error!(error = %e, "Sweep loop task panicked");
    }
    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}
