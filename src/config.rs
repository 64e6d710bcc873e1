use crate::cache::DEFAULT_TTL;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

impl Config {
    /// Loads the configuration from the optional file at `path`, overridden
    /// by `SCOUT__`-prefixed environment variables (e.g.
    /// `SCOUT__API__BASE_URL`). Missing fields take their defaults.
    pub fn load(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("SCOUT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Backend connection settings
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct ApiConfig {
    /// Root of the REST API
    #[default("http://localhost:3000/api".to_owned())]
    pub base_url: String,

    /// Root that relative media paths are resolved against. Falls back to
    /// `base_url` when unset.
    pub media_base_url: Option<String>,

    /// Timeout of a single HTTP request
    #[default(Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[default("listing-scout/0.1".to_owned())]
    pub user_agent: String,

    /// Path of the token refresh endpoint, relative to `base_url`
    #[default("auth/refresh".to_owned())]
    pub refresh_path: String,

    /// Bearer token of a signed-in session
    pub access_token: Option<String>,

    pub refresh_token: Option<String>,
}

/// Search cache settings
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which a cached collection is re-fetched
    #[default(DEFAULT_TTL)]
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Default number of results per page
    #[default(20)]
    pub page_size: usize,

    /// Upper bound on a search or collection load, including auth refresh
    #[default(Duration::from_secs(45))]
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Local persistence settings
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct StorageConfig {
    /// File holding the last used filters and page size
    #[default(PathBuf::from("listing-scout/search-filters.json"))]
    pub filters_path: PathBuf,

    /// Disables filter persistence entirely
    pub disabled: bool,
}

/// Log configuration
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[default("info".to_owned())]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}
