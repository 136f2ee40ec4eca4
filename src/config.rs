//! Configuration types for orderbook-fetcher
//!
//! Configuration is loaded once at start from a JSON file. Only
//! `retentionPeriod`, `interval`, `regions` and `citadels` matter for a
//! public-only setup; `clientId` and `refreshToken` are needed for citadels.
//! Everything else has a default.

use crate::error::{Error, Result};
use crate::types::{Location, LocationKind};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Main configuration for the fetcher
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// How many snapshots are kept on disk per location (0 = never rotate)
    #[serde(default = "default_retention_period")]
    pub retention_period: u32,

    /// Number of expiry cycles per full fetch (1 = fetch on every expiry)
    #[serde(default = "default_interval")]
    pub interval: u32,

    /// Public region identifiers
    #[serde(default)]
    pub regions: Vec<u64>,

    /// Access-controlled structure identifiers
    #[serde(default)]
    pub citadels: Vec<u64>,

    /// OAuth client id of the ESI application
    #[serde(default)]
    pub client_id: String,

    /// Long-lived refresh token used to obtain access tokens
    #[serde(default)]
    pub refresh_token: String,

    /// Directory the snapshot files are written to (default: "orderbooks")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upstream API settings
    #[serde(default)]
    pub esi: EsiConfig,

    /// Retry budget for a single page
    #[serde(default)]
    pub page_retry: RetryConfig,

    /// Delay applied to a location after a failed cycle
    #[serde(default)]
    pub failure_backoff: BackoffConfig,

    /// Status API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_period: default_retention_period(),
            interval: default_interval(),
            regions: vec![],
            citadels: vec![],
            client_id: String::new(),
            refresh_token: String::new(),
            output_dir: default_output_dir(),
            esi: EsiConfig::default(),
            page_retry: RetryConfig::default(),
            failure_backoff: BackoffConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for settings the fetcher cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() && self.citadels.is_empty() {
            return Err(Error::config(
                "at least one region or citadel must be configured",
                "regions",
            ));
        }

        if !self.citadels.is_empty() {
            if self.client_id.trim().is_empty() {
                return Err(Error::config(
                    "citadels require an ESI client id",
                    "clientId",
                ));
            }
            if self.refresh_token.trim().is_empty() {
                return Err(Error::config(
                    "citadels require a refresh token",
                    "refreshToken",
                ));
            }
        }

        if self.esi.page_size == 0 {
            return Err(Error::config("page size must be positive", "esi.pageSize"));
        }

        check_multiplier(self.page_retry.backoff_multiplier, "pageRetry.backoffMultiplier")?;
        check_multiplier(self.failure_backoff.multiplier, "failureBackoff.multiplier")?;

        url::Url::parse(&self.esi.base_url)
            .map_err(|e| Error::config(format!("invalid base URL: {e}"), "esi.baseUrl"))?;
        url::Url::parse(&self.esi.token_url)
            .map_err(|e| Error::config(format!("invalid token URL: {e}"), "esi.tokenUrl"))?;

        Ok(())
    }

    /// Every configured location, structures first
    pub fn locations(&self) -> Vec<Location> {
        self.citadels
            .iter()
            .map(|&id| Location::new(id, LocationKind::Structure))
            .chain(
                self.regions
                    .iter()
                    .map(|&id| Location::new(id, LocationKind::Region)),
            )
            .collect()
    }

    /// Whether any access-controlled location is configured
    pub fn needs_token(&self) -> bool {
        !self.citadels.is_empty()
    }
}

/// Upstream ESI settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsiConfig {
    /// Base URL of the ESI API (default: "https://esi.evetech.net/latest/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// ESI datasource query parameter (default: "tranquility")
    #[serde(default = "default_datasource")]
    pub datasource: String,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Margin added after a cache expiry before refetching (default: 1 second)
    #[serde(default = "default_expiry_grace", with = "duration_millis_serde")]
    pub expiry_grace: Duration,

    /// How long before token expiry the token is refreshed (default: 5 seconds)
    #[serde(default = "default_token_margin", with = "duration_serde")]
    pub token_refresh_margin: Duration,

    /// A page holding fewer orders than this is the last one (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for EsiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            datasource: default_datasource(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            expiry_grace: default_expiry_grace(),
            token_refresh_margin: default_token_margin(),
            page_size: default_page_size(),
        }
    }
}

/// Retry configuration for a failing page
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Number of retries after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds (default: 500)
    #[serde(default = "default_retry_delay", with = "duration_millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries in milliseconds (default: 5000)
    #[serde(default = "default_retry_max_delay", with = "duration_millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_retry_delay(),
            max_delay: default_retry_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Backoff applied to a location whose last cycle failed
///
/// A zero `initial_delay` requeues a failed location for an immediate retry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Delay after the first failure in seconds (default: 5)
    #[serde(default = "default_backoff_initial", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound on the delay in seconds (default: 300)
    #[serde(default = "default_backoff_max", with = "duration_serde")]
    pub max_delay: Duration,

    /// Growth factor per consecutive failure (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_backoff_initial(),
            max_delay: default_backoff_max(),
            multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Status API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Serve the status API (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Backoff multipliers must grow the delay and stay representable
fn check_multiplier(value: f64, key: &str) -> Result<()> {
    if !value.is_finite() || value < 1.0 {
        return Err(Error::config(
            format!("backoff multiplier must be a finite number >= 1.0, got {value}"),
            key,
        ));
    }
    Ok(())
}

// Default value functions
fn default_retention_period() -> u32 {
    12
}

fn default_interval() -> u32 {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("orderbooks")
}

fn default_base_url() -> String {
    "https://esi.evetech.net/latest/".to_string()
}

fn default_token_url() -> String {
    "https://login.eveonline.com/v2/oauth/token".to_string()
}

fn default_datasource() -> String {
    "tranquility".to_string()
}

fn default_user_agent() -> String {
    concat!("orderbook-fetcher/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_expiry_grace() -> Duration {
    Duration::from_secs(1)
}

fn default_token_margin() -> Duration {
    Duration::from_secs(5)
}

fn default_page_size() -> usize {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_retry_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_backoff_initial() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_CONFIG: &str = r#"{
        "retentionPeriod": 24,
        "interval": 3,
        "regions": [10000002, 10000043],
        "citadels": [1035466617946],
        "clientId": "abc123",
        "refreshToken": "refresh-me"
    }"#;

    #[test]
    fn legacy_config_file_still_parses() {
        let config: Config = serde_json::from_str(LEGACY_CONFIG).unwrap();

        assert_eq!(config.retention_period, 24);
        assert_eq!(config.interval, 3);
        assert_eq!(config.regions, vec![10000002, 10000043]);
        assert_eq!(config.citadels, vec![1035466617946]);
        assert_eq!(config.client_id, "abc123");
        assert_eq!(config.refresh_token, "refresh-me");

        // Everything else falls back to defaults
        assert_eq!(config.output_dir, PathBuf::from("orderbooks"));
        assert_eq!(config.esi.page_size, 1000);
        assert_eq!(config.esi.expiry_grace, Duration::from_secs(1));
        assert_eq!(config.page_retry.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn locations_list_structures_before_regions() {
        let config: Config = serde_json::from_str(LEGACY_CONFIG).unwrap();
        let locations = config.locations();

        assert_eq!(locations.len(), 3);
        assert_eq!(locations[0].kind, LocationKind::Structure);
        assert_eq!(locations[0].id, 1035466617946);
        assert_eq!(locations[1].kind, LocationKind::Region);
        assert_eq!(locations[2].id, 10000043);
        assert!(config.needs_token());
    }

    #[test]
    fn empty_location_list_is_rejected() {
        let config = Config::default();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("regions")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn citadels_without_credentials_are_rejected() {
        let config = Config {
            citadels: vec![1035466617946],
            client_id: "abc".into(),
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("refreshToken")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn regions_only_need_no_credentials() {
        let config = Config {
            regions: vec![10000002],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(!config.needs_token());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = Config {
            regions: vec![10000002],
            ..Default::default()
        };
        config.esi.base_url = "not a url".into();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn shrinking_or_non_finite_multipliers_are_rejected() {
        let base = Config {
            regions: vec![10000002],
            ..Default::default()
        };

        for bad in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let mut config = base.clone();
            config.page_retry.backoff_multiplier = bad;
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("pageRetry.backoffMultiplier"))
                }
                other => panic!("multiplier {bad} accepted: {other:?}"),
            }

            let mut config = base.clone();
            config.failure_backoff.multiplier = bad;
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("failureBackoff.multiplier"))
                }
                other => panic!("multiplier {bad} accepted: {other:?}"),
            }
        }

        let mut config = base;
        config.page_retry.backoff_multiplier = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_sections_use_their_units() {
        let json = r#"{
            "regions": [10000002],
            "esi": { "expiryGrace": 250, "requestTimeout": 10 },
            "pageRetry": { "maxRetries": 5, "initialDelay": 0 },
            "failureBackoff": { "initialDelay": 0 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.esi.expiry_grace, Duration::from_millis(250));
        assert_eq!(config.esi.request_timeout, Duration::from_secs(10));
        assert_eq!(config.page_retry.max_retries, 5);
        assert_eq!(config.page_retry.initial_delay, Duration::ZERO);
        assert_eq!(config.failure_backoff.initial_delay, Duration::ZERO);
        assert_eq!(config.failure_backoff.max_delay, Duration::from_secs(300));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, LEGACY_CONFIG).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retention_period, 24);

        let missing = Config::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }

    #[test]
    fn negative_duration_is_a_serde_error() {
        let json = r#"{"regions": [1], "esi": {"expiryGrace": -1}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }
}
