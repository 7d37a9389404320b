use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::currency::{default_usd_rate, UsdConverter};
use crate::pricing::resolver::ResolverSettings;
use crate::pricing::synthesis::SynthesisSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub resolver: ResolverSettings,
    pub pricing: PricingConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Default)]
pub struct CatalogConfig {
    /// Replacement catalog document; the embedded catalog is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub usd_rate: Decimal,
    pub stable_threshold_pct: f64,
    pub mean_reversion: f64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub usd_rate: Option<Decimal>,
    pub confidence_floor: Option<u8>,
    pub llm_enabled: Option<bool>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let synthesis = SynthesisSettings::default();
        Self {
            catalog: CatalogConfig::default(),
            resolver: ResolverSettings::default(),
            pricing: PricingConfig {
                usd_rate: default_usd_rate(),
                stable_threshold_pct: synthesis.stable_threshold_pct,
                mean_reversion: synthesis.mean_reversion,
            },
            llm: LlmConfig {
                enabled: false,
                api_key: None,
                base_url: "https://ai.gateway.lovable.dev/v1".to_string(),
                model: "google/gemini-2.5-flash".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                request_timeout_secs: 45,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl PricingConfig {
    pub fn converter(&self) -> Option<UsdConverter> {
        UsdConverter::new(self.usd_rate)
    }

    pub fn synthesis_settings(&self) -> SynthesisSettings {
        SynthesisSettings {
            stable_threshold_pct: self.stable_threshold_pct,
            mean_reversion: self.mean_reversion,
        }
    }
}

impl LlmConfig {
    /// Enabled and carrying a non-blank key.
    pub fn is_ready(&self) -> bool {
        self.enabled
            && self
                .api_key
                .as_ref()
                .map(|value| !value.expose_secret().trim().is_empty())
                .unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricelens.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = Some(path);
            }
        }

        if let Some(resolver) = patch.resolver {
            if let Some(exact_score) = resolver.exact_score {
                self.resolver.exact_score = exact_score;
            }
            if let Some(score) = resolver.query_contains_key_score {
                self.resolver.query_contains_key_score = score;
            }
            if let Some(score) = resolver.key_contains_query_score {
                self.resolver.key_contains_query_score = score;
            }
            if let Some(score) = resolver.word_overlap_score {
                self.resolver.word_overlap_score = score;
            }
            if let Some(min_word_len) = resolver.min_word_len {
                self.resolver.min_word_len = min_word_len;
            }
            if let Some(confidence_floor) = resolver.confidence_floor {
                self.resolver.confidence_floor = confidence_floor;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(usd_rate) = pricing.usd_rate {
                self.pricing.usd_rate = usd_rate;
            }
            if let Some(stable_threshold_pct) = pricing.stable_threshold_pct {
                self.pricing.stable_threshold_pct = stable_threshold_pct;
            }
            if let Some(mean_reversion) = pricing.mean_reversion {
                self.pricing.mean_reversion = mean_reversion;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(request_timeout_secs) = server.request_timeout_secs {
                self.server.request_timeout_secs = request_timeout_secs;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PRICELENS_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("PRICELENS_RESOLVER_CONFIDENCE_FLOOR") {
            self.resolver.confidence_floor = parse_env("PRICELENS_RESOLVER_CONFIDENCE_FLOOR", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_RESOLVER_MIN_WORD_LEN") {
            self.resolver.min_word_len = parse_env("PRICELENS_RESOLVER_MIN_WORD_LEN", &value)?;
        }

        if let Some(value) = read_env("PRICELENS_PRICING_USD_RATE") {
            self.pricing.usd_rate = parse_env("PRICELENS_PRICING_USD_RATE", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_PRICING_STABLE_THRESHOLD_PCT") {
            self.pricing.stable_threshold_pct =
                parse_env("PRICELENS_PRICING_STABLE_THRESHOLD_PCT", &value)?;
        }

        if let Some(value) = read_env("PRICELENS_LLM_ENABLED") {
            self.llm.enabled = parse_env("PRICELENS_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICELENS_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("PRICELENS_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PRICELENS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("PRICELENS_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_env("PRICELENS_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("PRICELENS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PRICELENS_SERVER_PORT") {
            self.server.port = parse_env("PRICELENS_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                parse_env("PRICELENS_SERVER_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICELENS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("PRICELENS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PRICELENS_LOGGING_LEVEL").or_else(|| read_env("PRICELENS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICELENS_LOGGING_FORMAT").or_else(|| read_env("PRICELENS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = Some(catalog_path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(usd_rate) = overrides.usd_rate {
            self.pricing.usd_rate = usd_rate;
        }
        if let Some(confidence_floor) = overrides.confidence_floor {
            self.resolver.confidence_floor = confidence_floor;
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_resolver(&self.resolver)?;
        validate_pricing(&self.pricing)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricelens.toml"), PathBuf::from("config/pricelens.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_resolver(resolver: &ResolverSettings) -> Result<(), ConfigError> {
    let scores = [
        ("resolver.exact_score", resolver.exact_score),
        ("resolver.query_contains_key_score", resolver.query_contains_key_score),
        ("resolver.key_contains_query_score", resolver.key_contains_query_score),
        ("resolver.word_overlap_score", resolver.word_overlap_score),
        ("resolver.confidence_floor", resolver.confidence_floor),
    ];
    if let Some((name, _)) = scores.iter().find(|(_, score)| *score > 100) {
        return Err(ConfigError::Validation(format!("{name} must be in range 0..=100")));
    }

    if resolver.min_word_len == 0 {
        return Err(ConfigError::Validation(
            "resolver.min_word_len must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.usd_rate <= Decimal::ZERO {
        return Err(ConfigError::Validation(
            "pricing.usd_rate must be greater than zero".to_string(),
        ));
    }

    if !(pricing.stable_threshold_pct.is_finite() && pricing.stable_threshold_pct >= 0.0) {
        return Err(ConfigError::Validation(
            "pricing.stable_threshold_pct must be a non-negative number".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&pricing.mean_reversion) {
        return Err(ConfigError::Validation(
            "pricing.mean_reversion must be in range 0.0..=1.0".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.enabled {
        return Ok(());
    }

    let missing_key = llm
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_key {
        return Err(ConfigError::Validation(
            "llm.api_key is required when llm.enabled is true".to_string(),
        ));
    }

    if !llm.base_url.starts_with("http://") && !llm.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.request_timeout_secs == 0 || server.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "server.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    resolver: Option<ResolverPatch>,
    pricing: Option<PricingPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ResolverPatch {
    exact_score: Option<u8>,
    query_contains_key_score: Option<u8>,
    key_contains_query_score: Option<u8>,
    word_overlap_score: Option<u8>,
    min_word_len: Option<usize>,
    confidence_floor: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    usd_rate: Option<Decimal>,
    stable_threshold_pct: Option<f64>,
    mean_reversion: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
