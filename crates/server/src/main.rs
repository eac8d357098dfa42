use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckcast_core::{
    load_config, validate_config, ArtifactStore, PipelineEngine, RunStore, SqliteArtifactStore,
    SqliteRunStore, StageSet, TemplateAudioGenerator, TemplateNarrationGenerator,
    TemplateOutlineGenerator,
};
use deckcast_server::api::create_router;
use deckcast_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DECKCAST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Create SQLite run store
    let run_store: Arc<dyn RunStore> = Arc::new(
        SqliteRunStore::new(&config.database.path).context("Failed to create run store")?,
    );
    info!("Run store initialized");

    // Create SQLite artifact store
    let artifact_store: Arc<dyn ArtifactStore> = Arc::new(
        SqliteArtifactStore::new(&config.database.path)
            .context("Failed to create artifact store")?,
    );
    info!("Artifact store initialized");

    let stages = StageSet::from_generators(
        Arc::new(TemplateOutlineGenerator::new()),
        Arc::new(TemplateNarrationGenerator::new()),
        Arc::new(TemplateAudioGenerator::new()),
        Arc::clone(&artifact_store),
    );

    let engine = Arc::new(PipelineEngine::new(
        config.orchestrator.clone(),
        config.generation.clone(),
        run_store,
        artifact_store,
        stages,
    ));
    info!("Pipeline engine initialized");

    if config.orchestrator.recover_on_startup {
        let recovered = engine
            .recover_interrupted_runs()
            .await
            .context("Failed to recover interrupted runs")?;
        info!("Startup recovery complete ({} run(s) failed)", recovered);
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&engine)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    engine.shutdown();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
