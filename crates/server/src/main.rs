use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabrica_core::{
    create_authenticator, create_payment_processor, create_pricing_engine, load_config,
    validate_config, AdmissionController, Authenticator, CreationOrchestrator, FsObjectStore,
    GenerationBackend, HttpGenerationBackend, JobStore, ObjectStore, PaymentProcessor,
    ProcLoadProbe, SqliteJobStore,
};

use fabrica_server::api::create_router;
use fabrica_server::state::AppState;

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
    let config_path = std::env::var("FABRICA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite job store
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Create admission controller and start its eviction sweep
    let admission = Arc::new(
        AdmissionController::new(config.admission.clone())
            .context("Failed to create admission controller")?,
    );
    admission.start();
    info!(
        zones = config.admission.zones.len(),
        routes = config.admission.routes.len(),
        "Admission controller initialized"
    );

    // Create pricing engine; the active-user signal comes from the job store
    let active_users = {
        let job_store = Arc::clone(&job_store);
        Arc::new(move || job_store.count_active_owners().unwrap_or(0) as u32)
    };
    let (pricing, sampler) = create_pricing_engine(
        config.pricing.clone(),
        Arc::new(ProcLoadProbe::new()),
        active_users,
    );
    let sampler_handle = tokio::spawn(sampler.run());
    info!("Pricing engine initialized");

    // Create generation backend
    let backend_config = config
        .backend
        .clone()
        .context("A [backend] section is required to start the server")?;
    info!("Using generation backend at {}", backend_config.url);
    let backend: Arc<dyn GenerationBackend> = Arc::new(HttpGenerationBackend::new(backend_config));

    // Create payment processor
    let payments: Arc<dyn PaymentProcessor> =
        Arc::from(create_payment_processor(&config.payments));
    info!("Using payment processor: {}", payments.processor_name());

    // Create object store for artifacts
    let object_store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.storage.clone()));
    info!("Artifact store root: {:?}", config.storage.root_dir);

    // Create orchestrator
    let orchestrator = Arc::new(CreationOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&job_store),
        Arc::clone(&admission),
        pricing.clone(),
        backend,
        payments,
        object_store,
        config.sharing.base_url.clone(),
    ));

    if config.orchestrator.enabled {
        orchestrator.start().await;
    } else {
        info!("Orchestrator disabled in config; submissions will be refused");
    }

    // Create app state
    let app_state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        Arc::clone(&admission),
        pricing,
        Arc::clone(&orchestrator),
        job_store,
    ));

    // Create router
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");

    // Stop background loops
    if config.orchestrator.enabled {
        orchestrator.stop().await;
    }
    admission.stop();

    // Drop the remaining pricing handles so the sampler's channel closes,
    // then wait for it to exit.
    drop(orchestrator);
    let _ = sampler_handle.await;
    info!("Surge sampler stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
