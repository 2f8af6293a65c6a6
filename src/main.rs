//! Application entry point.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::SecretString;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tx_lifecycle_coordinator::api::create_router;
use tx_lifecycle_coordinator::app::{AppState, CoordinatorConfig, DEFAULT_MAX_CALL_SITES, ErrorClassifier};
use tx_lifecycle_coordinator::domain::{LedgerClient, NotificationSurface, ReentryPolicy, WalletProvider};
use tx_lifecycle_coordinator::infra::{
    GatewayConfig, GatewayLedgerClient, InMemoryNotificationSurface, LocalKeyWallet,
    SimulatedLedgerClient, SimulatedLedgerConfig, TracingNotificationSurface,
};

/// Application configuration
struct Config {
    host: String,
    port: u16,
    /// Gateway base URL; the simulated ledger is used when unset
    ledger_gateway_url: Option<String>,
    ledger_api_key: Option<SecretString>,
    gateway_config: GatewayConfig,
    simulated_config: SimulatedLedgerConfig,
    coordinator_config: CoordinatorConfig,
    max_call_sites: usize,
    /// JSON file with classifier rules added to the defaults
    classifier_rules_path: Option<String>,
    wallet_private_key: Option<SecretString>,
    /// `memory` (listable by the dashboard) or `tracing`
    notification_surface: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_env("PORT", 3000u16)?;

        let ledger_gateway_url = non_empty_env("LEDGER_GATEWAY_URL");
        let ledger_api_key = non_empty_env("LEDGER_API_KEY").map(SecretString::from);
        let gateway_config = GatewayConfig {
            request_timeout: Duration::from_millis(parse_env("LEDGER_REQUEST_TIMEOUT_MS", 15_000u64)?),
            poll_interval: Duration::from_millis(parse_env("LEDGER_POLL_INTERVAL_MS", 1_000u64)?),
        };
        let simulated_config = SimulatedLedgerConfig {
            submit_latency: Duration::from_millis(parse_env("SIMULATED_SUBMIT_LATENCY_MS", 500u64)?),
            confirm_latency: Duration::from_millis(parse_env("SIMULATED_CONFIRM_LATENCY_MS", 3_000u64)?),
        };

        let confirmation_timeout_ms = parse_env("CONFIRMATION_TIMEOUT_MS", 30_000u64)?;
        if confirmation_timeout_ms == 0 {
            anyhow::bail!("CONFIRMATION_TIMEOUT_MS must be greater than zero");
        }
        let coordinator_config = CoordinatorConfig {
            confirmation_timeout: Duration::from_millis(confirmation_timeout_ms),
            auto_dismiss_after: Duration::from_millis(parse_env("NOTIFICATION_AUTO_DISMISS_MS", 5_000u64)?),
            reentry: parse_env("REENTRY_POLICY", ReentryPolicy::Supersede)?,
        };

        let max_call_sites = parse_env("MAX_CALL_SITES", DEFAULT_MAX_CALL_SITES)?;
        if max_call_sites == 0 {
            anyhow::bail!("MAX_CALL_SITES must be greater than zero");
        }

        let notification_surface = env::var("NOTIFICATION_SURFACE")
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_else(|_| "memory".to_string());
        if !matches!(notification_surface.as_str(), "memory" | "tracing") {
            anyhow::bail!(
                "NOTIFICATION_SURFACE must be 'memory' or 'tracing', got '{}'",
                notification_surface
            );
        }

        Ok(Self {
            host,
            port,
            ledger_gateway_url,
            ledger_api_key,
            gateway_config,
            simulated_config,
            coordinator_config,
            max_call_sites,
            classifier_rules_path: non_empty_env("CLASSIFIER_RULES_PATH"),
            wallet_private_key: non_empty_env("WALLET_PRIVATE_KEY").map(SecretString::from),
            notification_surface,
        })
    }

    fn load_classifier(&self) -> Result<ErrorClassifier> {
        let mut classifier = ErrorClassifier::default();
        if let Some(path) = &self.classifier_rules_path {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read CLASSIFIER_RULES_PATH {}", path))?;
            let rules = ErrorClassifier::rules_from_json(&json)
                .with_context(|| format!("Failed to parse classifier rules in {}", path))?;
            info!(count = rules.len(), path = %path, "Loaded extra classifier rules");
            classifier.extend(rules);
        }
        Ok(classifier)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        None => Ok(default),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

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
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    info!("Transaction Lifecycle Coordinator v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let ledger: Arc<dyn LedgerClient> = match &config.ledger_gateway_url {
        Some(url) => {
            let client = GatewayLedgerClient::new(
                url,
                config.ledger_api_key.clone(),
                config.gateway_config.clone(),
            )
            .context("Failed to build ledger gateway client")?;
            info!(url = %url, "Using ledger gateway");
            Arc::new(client)
        }
        None => {
            warn!("LEDGER_GATEWAY_URL not set, using the simulated ledger");
            Arc::new(SimulatedLedgerClient::new(config.simulated_config.clone()))
        }
    };

    let surface: Arc<dyn NotificationSurface> = match config.notification_surface.as_str() {
        "tracing" => Arc::new(TracingNotificationSurface::new()),
        _ => Arc::new(InMemoryNotificationSurface::new()),
    };

    let classifier = Arc::new(config.load_classifier()?);

    let mut app_state = AppState::with_classifier(ledger, surface, classifier)
        .with_defaults(config.coordinator_config)
        .with_max_call_sites(config.max_call_sites);

    match &config.wallet_private_key {
        Some(secret) => {
            let wallet = LocalKeyWallet::from_base58(secret)
                .context("Failed to parse WALLET_PRIVATE_KEY as Base58")?;
            info!(address = %wallet.address(), "Wallet approval stage enabled");
            app_state = app_state.with_wallet(Arc::new(wallet));
        }
        None => info!("No wallet configured, actions are submitted without approval"),
    }

    info!(
        timeout_ms = config.coordinator_config.confirmation_timeout.as_millis() as u64,
        auto_dismiss_ms = config.coordinator_config.auto_dismiss_after.as_millis() as u64,
        reentry = ?config.coordinator_config.reentry,
        max_call_sites = config.max_call_sites,
        surface = %config.notification_surface,
        "Coordinator defaults"
    );

    let router = create_router(Arc::new(app_state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server starting on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
