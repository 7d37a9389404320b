use std::sync::Arc;
use std::time::Duration;

use pricelens_agent::{GatewayOracle, OracleError, PricingOracle};
use pricelens_core::config::{AppConfig, ConfigError, LoadOptions};
use pricelens_core::pricing::catalog::{Catalog, CatalogError};
use pricelens_core::pricing::PricingRuntime;
use thiserror::Error;
use tracing::info;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub runtime: Arc<PricingRuntime>,
    pub oracle: Option<Arc<dyn PricingOracle>>,
    pub oracle_timeout: Duration,
}

impl AppState {
    pub fn oracle_mode(&self) -> &'static str {
        if self.oracle.is_some() {
            "gateway"
        } else {
            "local"
        }
    }
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("catalog load failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("generative backend setup failed: {0}")]
    Oracle(#[from] OracleError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let catalog = Arc::new(Catalog::load_or_embedded(config.catalog.path.as_deref())?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        correlation_id = "bootstrap",
        entries = catalog.len(),
        fingerprint = catalog.fingerprint(),
        "reference catalog loaded"
    );

    let converter = config.pricing.converter().ok_or_else(|| {
        ConfigError::Validation("pricing.usd_rate must be greater than zero".to_string())
    })?;
    let runtime = PricingRuntime::from_catalog(
        catalog.clone(),
        config.resolver,
        config.pricing.synthesis_settings(),
        converter,
    );

    let oracle = if config.llm.is_ready() {
        let gateway: Arc<dyn PricingOracle> = Arc::new(GatewayOracle::from_config(&config.llm)?);
        Some(gateway)
    } else {
        None
    };

    let state = AppState {
        catalog,
        runtime: Arc::new(runtime),
        oracle,
        oracle_timeout: Duration::from_secs(config.server.request_timeout_secs),
    };
    info!(
        event_name = "system.bootstrap.oracle_mode",
        correlation_id = "bootstrap",
        mode = state.oracle_mode(),
        model = %config.llm.model,
        "pricing backend selected"
    );

    Ok(Application { config, state })
}
