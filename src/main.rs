//! Session Lifecycle Service
//!
//! Device session bookkeeping for the school administration portal:
//! - Fingerprinting and advisory security flags at sign-in
//! - Single current session per account with a periodic heartbeat
//! - Reauthenticated remote termination of other devices
//! - Immediate sign-out of a device whose session record disappears

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use api::{router, AppState};
use fingerprint::FingerprintConfig;
use lifecycle::{LifecycleConfig, LocalAccount, LocalAuthProvider, SessionLifecycleManager};
use registry::{MemoryRegistry, RegistryConfig, SessionRegistry};
use telemetry::{health, init_tracing_from_env, log_snapshot, metrics};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    lifecycle: LifecycleConfig,

    #[serde(default)]
    fingerprint: FingerprintConfig,

    #[serde(default)]
    registry: RegistryConfig,

    /// Accounts accepted by the built-in auth provider
    #[serde(default)]
    accounts: Vec<LocalAccount>,

    /// Client eviction and actor pruning period
    #[serde(default = "default_maintenance_interval_secs")]
    maintenance_interval_secs: u64,

    /// Clients without an authenticated request for this long are logged out
    #[serde(default = "default_client_idle_ttl_secs")]
    client_idle_ttl_secs: u64,

    /// Metrics snapshot logging period
    #[serde(default = "default_metrics_interval_secs")]
    metrics_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_maintenance_interval_secs() -> u64 {
    60
}

fn default_client_idle_ttl_secs() -> u64 {
    30 * 60
}

fn default_metrics_interval_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            lifecycle: LifecycleConfig::default(),
            fingerprint: FingerprintConfig::default(),
            registry: RegistryConfig::default(),
            accounts: Vec::new(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            client_idle_ttl_secs: default_client_idle_ttl_secs(),
            metrics_interval_secs: default_metrics_interval_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Session Lifecycle Service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    if config.accounts.is_empty() {
        warn!("No accounts configured, every sign-in will be rejected");
    }
    info!(
        accounts = config.accounts.len(),
        heartbeat_secs = config.lifecycle.heartbeat_interval_secs,
        heartbeat_scope = ?config.lifecycle.heartbeat_scope,
        geo_url = %config.fingerprint.geo.url,
        "Loaded configuration"
    );

    let registry: Arc<dyn SessionRegistry> =
        Arc::new(MemoryRegistry::new(config.registry.clone()));
    let auth = Arc::new(LocalAuthProvider::new(config.accounts.clone()));

    let (collector, evaluator) = fingerprint::from_config(&config.fingerprint)
        .context("Failed to build fingerprint lookups")?;

    check_health(registry.as_ref());

    let manager = Arc::new(SessionLifecycleManager::new(
        registry,
        auth,
        Arc::new(collector),
        Arc::new(evaluator),
        config.lifecycle.clone(),
    ));

    let state = AppState::with_client_idle_ttl(
        manager,
        Duration::from_secs(config.client_idle_ttl_secs.max(1)),
    );

    let _maintenance = state.start_maintenance(Duration::from_secs(
        config.maintenance_interval_secs.max(1),
    ));
    let _metrics_logger =
        start_metrics_logger(Duration::from_secs(config.metrics_interval_secs.max(1)));
    info!(
        maintenance_secs = config.maintenance_interval_secs,
        metrics_secs = config.metrics_interval_secs,
        "Started background tasks"
    );

    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!(clients = state.clients.len(), "Shutting down...");
    log_snapshot(&metrics().snapshot());

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. SESSIONS__LIFECYCLE__HEARTBEAT_SCOPE
        .add_source(
            config::Environment::with_prefix("SESSIONS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Record component health on startup.
fn check_health(registry: &dyn SessionRegistry) {
    if registry.is_healthy() {
        health().registry.set_healthy();
        info!("Session registry: healthy");
    } else {
        health().registry.set_unhealthy("Registry unreachable");
        warn!("Session registry: unhealthy");
    }

    // Geolocation starts healthy; lookups flip it on failure.
    health().geolocation.set_healthy();
}

fn start_metrics_logger(period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            log_snapshot(&metrics().snapshot());
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
