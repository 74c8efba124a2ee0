//! Triage Server
//!
//! HTTP API for AI-assisted support ticket triage.
//!
//! Tickets submitted through the API are classified synchronously through
//! a remote LLM backend with a local keyword fallback, then persisted to
//! SQLite together with their classification.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use triage_classifiers::{ClassifierDispatcher, KeywordClassifier, RemoteClassifier};
use triage_server::{routes, AppState, Cli, ServerConfig, TicketStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting Triage Server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Database: {}", config.database_url);

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Connect storage and build the classification dispatcher
    let store = TicketStore::connect(&config.database_url).await?;
    let dispatcher = Arc::new(build_dispatcher(&config)?);

    let state = AppState::new(store, dispatcher, Some(metrics_handle));

    // Build and run the server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", cli.listen, cli.port).parse()?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Build the dispatcher from config: remote primary plus keyword fallback
/// when a backend is configured, fallback-only otherwise.
fn build_dispatcher(config: &ServerConfig) -> Result<ClassifierDispatcher> {
    let fallback = KeywordClassifier::new()?;

    match config.remote_config() {
        Some(remote) => {
            info!("Primary classifier: {} via {}", remote.model, remote.api_base);
            let primary = RemoteClassifier::new(remote)?;
            Ok(ClassifierDispatcher::new(
                Arc::new(primary),
                fallback,
                config.breaker_config(),
            ))
        }
        None => {
            warn!("No remote backend configured, running keyword fallback only");
            Ok(ClassifierDispatcher::fallback_only(fallback))
        }
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("triage_server=debug,triage_classifiers=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!("triage_requests_total", "Total number of API requests by endpoint");
    metrics::describe_counter!(
        "triage_classifications_total",
        "Total number of classifications by engine"
    );
    metrics::describe_counter!(
        "triage_fallbacks_total",
        "Total number of keyword fallbacks by reason"
    );
    metrics::describe_counter!(
        "triage_breaker_transitions_total",
        "Circuit breaker state transitions"
    );
    metrics::describe_histogram!(
        "triage_classification_latency_ms",
        metrics::Unit::Milliseconds,
        "Classification latency in milliseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
