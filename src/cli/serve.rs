//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{AugurConfig, LogFormat};
use crate::pipeline::PipelineOrchestrator;
use crate::provider::create_provider;
use crate::registry::{ServiceId, ServiceRegistry, ServiceSettings, ServiceState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load a config file if it exists, otherwise defaults, then apply `AUGUR_*`.
pub fn load_config(path: &Path) -> Result<AugurConfig, Box<dyn std::error::Error>> {
    let config = if path.exists() {
        AugurConfig::load(Some(path))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        AugurConfig::default()
    };
    Ok(config.with_env_overrides())
}

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<AugurConfig, Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;

    // CLI flags win over file and environment
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Create, initialize and register a provider for every `[[services]]` entry.
pub async fn load_services_from_config(
    config: &AugurConfig,
    registry: &ServiceRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()?,
    );

    for service_config in &config.services {
        let provider = create_provider(service_config, Arc::clone(&client))
            .await
            .map_err(|e| format!("service '{}': {}", service_config.id, e))?;
        let settings = ServiceSettings::resolve(
            service_config,
            &config.rate_limit,
            &config.circuit_breaker,
        );

        registry.register(ServiceState::new(
            ServiceId::new(service_config.id.clone()),
            provider,
            settings,
        ))?;
        tracing::info!(
            service = %service_config.id,
            provider = %service_config.kind,
            max_retries = service_config.max_retries,
            "Registered service"
        );
    }

    Ok(())
}

/// Registry plus orchestrator for a validated configuration.
pub async fn build_orchestrator(
    config: &AugurConfig,
) -> Result<Arc<PipelineOrchestrator>, Box<dyn std::error::Error>> {
    let registry = Arc::new(ServiceRegistry::new());
    load_services_from_config(config, &registry).await?;

    let orchestrator = PipelineOrchestrator::builder(registry)
        .retry(config.retry.clone())
        .strategies(config.fallback.strategies.clone())
        .pipeline_config(config.pipeline.clone())
        .build();
    Ok(Arc::new(orchestrator))
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!("Starting Augur server");
    tracing::debug!(?config, "Loaded configuration");

    let orchestrator = build_orchestrator(&config).await?;
    orchestrator.start_health_monitor(config.health_check.clone());

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(
        Arc::clone(&orchestrator),
        Arc::new(config),
    ));
    let app = create_router(state);

    tracing::info!(addr = %addr, "Augur API server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // The orchestrator drains before the listener closes so that runs already
    // accepted can still write their responses.
    let cancel_token = CancellationToken::new();
    let drain = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel_token = cancel_token.clone();
        async move {
            shutdown_signal(cancel_token).await;
            orchestrator.shutdown().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(drain)
        .await?;

    // No-op when the drain already ran
    tokio::time::timeout(Duration::from_secs(1), orchestrator.shutdown())
        .await
        .ok();

    tracing::info!("Augur server stopped");
    Ok(())
}
