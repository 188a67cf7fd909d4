//! Service configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use egg_credit_core::DEFAULT_THB_PER_USD;

/// Default start of the Portkey analytics window.
pub const DEFAULT_PORTKEY_WINDOW_START: &str = "2025-08-01T00:00:00Z";

/// Errors in the loaded configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is missing.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an unusable value.
    #[error("invalid setting {name}: {reason}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:3000").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/egg-credit").
    pub data_dir: String,

    /// Service API key for service-to-service auth. Auth is off when unset.
    pub service_api_key: Option<String>,

    /// Portkey analytics endpoint URL.
    pub portkey_url: Option<String>,

    /// Portkey API key.
    pub portkey_api_key: Option<String>,

    /// Portkey workspace slug.
    pub portkey_workspace_slug: String,

    /// Start of the Portkey analytics window (RFC 3339).
    pub portkey_window_start: String,

    /// Portkey request timeout in seconds.
    pub portkey_timeout_seconds: u64,

    /// THB per USD exchange rate used by the cost conversion.
    pub thb_per_usd: Decimal,

    /// Timeout for each store call in milliseconds.
    pub store_timeout_ms: u64,

    /// Timeout for the detached usage-event append in seconds.
    pub event_append_timeout_seconds: u64,

    /// Reconciliation interval in seconds (0 disables the job).
    pub reconcile_interval_seconds: u64,

    /// Number of users recomputed concurrently by the reconciler.
    pub reconcile_concurrency: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Portkey secrets file structure.
#[derive(Debug, Deserialize)]
struct PortkeySecrets {
    url: String,
    api_key: String,
    #[serde(default)]
    workspace_slug: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let (portkey_url, portkey_api_key, portkey_workspace_slug) = load_portkey_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            service_api_key: std::env::var("SERVICE_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            portkey_url,
            portkey_api_key,
            portkey_workspace_slug: portkey_workspace_slug.unwrap_or_default(),
            portkey_window_start: std::env::var("PORTKEY_WINDOW_START")
                .unwrap_or(defaults.portkey_window_start),
            portkey_timeout_seconds: env_parse(
                "PORTKEY_TIMEOUT_SECONDS",
                defaults.portkey_timeout_seconds,
            ),
            thb_per_usd: env_parse("THB_PER_USD", defaults.thb_per_usd),
            store_timeout_ms: env_parse("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            event_append_timeout_seconds: env_parse(
                "EVENT_APPEND_TIMEOUT_SECONDS",
                defaults.event_append_timeout_seconds,
            ),
            reconcile_interval_seconds: env_parse(
                "RECONCILE_INTERVAL_SECONDS",
                defaults.reconcile_interval_seconds,
            ),
            reconcile_concurrency: env_parse(
                "RECONCILE_CONCURRENCY",
                defaults.reconcile_concurrency,
            ),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
        }
    }

    /// Check that the settings needed to serve debits are present and sane.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portkey_url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("PORTKEY_URL"));
        }
        if self.portkey_api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("PORTKEY_API_KEY"));
        }
        if self.thb_per_usd <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                name: "THB_PER_USD",
                reason: "must be positive".into(),
            });
        }
        if self.reconcile_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "RECONCILE_CONCURRENCY",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Timeout for each store call.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Timeout for the detached usage-event append.
    #[must_use]
    pub const fn event_append_timeout(&self) -> Duration {
        Duration::from_secs(self.event_append_timeout_seconds)
    }

    /// Reconciliation interval, `None` when the job is disabled.
    #[must_use]
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_seconds > 0)
            .then(|| Duration::from_secs(self.reconcile_interval_seconds))
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %raw, "Ignoring unparseable setting");
            default
        }),
        Err(_) => default,
    }
}

/// Load Portkey secrets from file or environment.
fn load_portkey_secrets() -> (Option<String>, Option<String>, Option<String>) {
    let secret_paths = [".secrets/portkey.json", "../.secrets/portkey.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<PortkeySecrets>(path) {
            tracing::info!(path = %path, "Loaded Portkey secrets from file");
            return (
                Some(secrets.url),
                Some(secrets.api_key),
                secrets
                    .workspace_slug
                    .or_else(|| std::env::var("PORTKEY_WORKSPACE_SLUG").ok()),
            );
        }
    }

    // Fall back to environment variables
    tracing::debug!("Portkey secrets file not found, using environment variables");
    (
        std::env::var("PORTKEY_URL").ok(),
        std::env::var("PORTKEY_API_KEY").ok(),
        std::env::var("PORTKEY_WORKSPACE_SLUG").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            data_dir: "/data/egg-credit".into(),
            service_api_key: None,
            portkey_url: None,
            portkey_api_key: None,
            portkey_workspace_slug: String::new(),
            portkey_window_start: DEFAULT_PORTKEY_WINDOW_START.into(),
            portkey_timeout_seconds: 15,
            thb_per_usd: Decimal::from(DEFAULT_THB_PER_USD),
            store_timeout_ms: 5000,
            event_append_timeout_seconds: 5,
            reconcile_interval_seconds: 0,
            reconcile_concurrency: 8,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
