use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Prefix for environment overrides, e.g. `METEORA__API__TIMEOUT_SECS=5`.
const ENV_PREFIX: &str = "METEORA";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the persisted dashboard state and cache snapshots
    pub data_dir: PathBuf,

    /// Remote endpoints
    pub api: ApiConfig,

    /// Offline cache manager settings
    pub offline: OfflineConfig,

    /// Dashboard behaviour
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub forecast_url: String,
    pub geocoding_url: String,
    pub reverse_geocoding_url: String,
    pub air_quality_url: String,

    /// Per-request timeout; in-flight requests are aborted after this
    pub timeout_secs: u64,

    /// Maximum number of city candidates returned by a search
    pub search_limit: usize,

    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            reverse_geocoding_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
            air_quality_url: "https://air-quality-api.open-meteo.com/v1/air-quality"
                .to_string(),
            timeout_secs: 10,
            search_limit: 8,
            user_agent: concat!("Meteora/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// Prefix shared by every cache partition name
    pub cache_prefix: String,

    /// Version tag embedded in partition names; bump to invalidate old caches
    pub version: String,

    /// Origin that relative asset paths are resolved against
    pub origin: String,

    /// Path of the application shell document
    pub app_shell: String,

    /// Static asset manifest (paths relative to `origin`, or absolute URLs)
    pub static_assets: Vec<String>,

    /// URL prefixes treated as remote data endpoints (network-first)
    pub data_endpoints: Vec<String>,

    /// Retention window for dynamic data entries
    pub data_max_age_hours: u32,

    /// Cadence of the expired-entry sweep
    pub sweep_interval_minutes: u32,

    /// Activate immediately after install instead of waiting for `activate-now`
    pub skip_waiting: bool,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_prefix: "meteora".to_string(),
            version: "v1.0.0".to_string(),
            origin: "http://localhost:8080/".to_string(),
            app_shell: "/index.html".to_string(),
            static_assets: [
                "/",
                "/index.html",
                "/styles.css",
                "/js/main.js",
                "/js/api.js",
                "/js/state.js",
                "/js/ui.js",
                "/js/charts.js",
                "/js/utils.js",
                "/manifest.webmanifest",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            data_endpoints: vec![
                "https://api.open-meteo.com/".to_string(),
                "https://geocoding-api.open-meteo.com/".to_string(),
                "https://air-quality-api.open-meteo.com/".to_string(),
            ],
            data_max_age_hours: 24,
            sweep_interval_minutes: 60,
            skip_waiting: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Quiet period before a search query is sent
    pub search_debounce_ms: u64,

    /// Refresh on becoming visible when data is older than this
    pub stale_on_visible_minutes: u32,

    /// Refresh on reconnect when data is older than this
    pub stale_on_online_minutes: u32,

    /// Location used when nothing is saved and geolocation is not granted
    pub default_location: DefaultLocation,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 300,
            stale_on_visible_minutes: 10,
            stale_on_online_minutes: 5,
            default_location: DefaultLocation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub name: String,
    pub country: String,
    pub admin1: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            name: "New York".to_string(),
            country: "US".to_string(),
            admin1: "New York".to_string(),
            latitude: 40.7128,
            longitude: -74.0060,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meteora");

        Self {
            data_dir,
            api: ApiConfig::default(),
            offline: OfflineConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the user config file, creating it if missing.
    ///
    /// `METEORA__<SECTION>__<KEY>` environment variables override file values.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file; missing keys take defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let layered = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read config sources")?;

        let config: Config = layered
            .try_deserialize()
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.api.forecast_url, "api.forecast_url", &mut result);
        self.validate_url(&self.api.geocoding_url, "api.geocoding_url", &mut result);
        self.validate_url(
            &self.api.reverse_geocoding_url,
            "api.reverse_geocoding_url",
            &mut result,
        );
        self.validate_url(&self.api.air_quality_url, "api.air_quality_url", &mut result);
        self.validate_url(&self.offline.origin, "offline.origin", &mut result);

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Timeout must be greater than 0");
        } else if self.api.timeout_secs > 120 {
            result.add_warning("api.timeout_secs", "Timeout is unusually long (>120s)");
        }

        if self.api.search_limit == 0 {
            result.add_error("api.search_limit", "Search limit must be greater than 0");
        }

        if self.offline.version.trim().is_empty() {
            result.add_error("offline.version", "Cache version tag must not be empty");
        }

        if !self.offline.app_shell.starts_with('/') {
            result.add_error("offline.app_shell", "Shell path must start with '/'");
        }

        if self.offline.data_max_age_hours == 0 {
            result.add_warning(
                "offline.data_max_age_hours",
                "Cached data expires immediately (0 hours)",
            );
        }

        if self.offline.sweep_interval_minutes == 0 {
            result.add_error(
                "offline.sweep_interval_minutes",
                "Sweep interval must be greater than 0",
            );
        }

        if self.offline.static_assets.is_empty() {
            result.add_warning("offline.static_assets", "No static assets will be precached");
        }

        let home = &self.dashboard.default_location;
        if !(-90.0..=90.0).contains(&home.latitude) {
            result.add_error("dashboard.default_location.latitude", "Latitude out of range");
        }
        if !(-180.0..=180.0).contains(&home.longitude) {
            result.add_error(
                "dashboard.default_location.longitude",
                "Longitude out of range",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// File holding the persisted dashboard state
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("meteora_state.json")
    }

    /// Directory holding cache partition snapshots
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("caches")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("meteora");

        Ok(config_dir.join("config.toml"))
    }
}
