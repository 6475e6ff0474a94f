use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for ApiCov
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiCovConfig {
    /// Call interception settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Where the API specification comes from and how paths are matched
    #[serde(default)]
    pub spec: SpecConfig,

    /// Report, insight and export settings
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Mirror every observation into the process-wide shared store
    #[serde(default = "default_true")]
    pub shared_tracking: bool,

    /// Per-call timeout in milliseconds (0 disables the timeout)
    #[serde(default)]
    pub request_timeout_ms: u64,

    /// Treat non-2xx responses as transport failures
    #[serde(default = "default_true")]
    pub error_on_status: bool,

    /// Keep request headers on recorded observations
    #[serde(default = "default_true")]
    pub record_headers: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            shared_tracking: true,
            request_timeout_ms: 0,
            error_on_status: true,
            record_headers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpecConfig {
    /// File path or http(s) URL of the OpenAPI document
    #[serde(default)]
    pub source: Option<String>,

    /// Remove the server base path from observed paths before matching
    #[serde(default)]
    pub strip_base_path: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Emit the header row in CSV exports
    #[serde(default = "default_true")]
    pub csv_include_headers: bool,

    /// `name` attribute of the exported JUnit test suite
    #[serde(default = "default_junit_suite_name")]
    pub junit_suite_name: String,

    /// Latency percentiles reported by the insight engine
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,

    /// Error-rate percentage above which a recommendation is raised
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    /// Number of entries in the slowest / most-used endpoint lists
    #[serde(default = "default_top_endpoints")]
    pub top_endpoints: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            csv_include_headers: true,
            junit_suite_name: default_junit_suite_name(),
            percentiles: default_percentiles(),
            error_rate_threshold: default_error_rate_threshold(),
            top_endpoints: default_top_endpoints(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "pretty" or "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_junit_suite_name() -> String {
    "API Coverage Tests".to_string()
}
fn default_percentiles() -> Vec<f64> {
    vec![50.0, 90.0, 95.0, 99.0]
}
fn default_error_rate_threshold() -> f64 {
    10.0
}
fn default_top_endpoints() -> usize {
    5
}
fn default_log_level() -> String {
    "warn".to_string()
} // Keep test output quiet unless asked
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with file discovery and env overrides
pub struct ConfigManager {
    config: ApiCovConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.apicov.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("Loading ApiCov configuration");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!(config_file = %path.display(), "Configuration loaded"),
            None => info!("Configuration loaded (defaults, no config file)"),
        }
        info!(
            shared_tracking = config.tracking.shared_tracking,
            request_timeout_ms = config.tracking.request_timeout_ms,
            spec_source = ?config.spec.source,
            "Tracking settings"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load an explicit config file, still honouring env overrides.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already-built configuration after validating it.
    pub fn from_config(config: ApiCovConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".apicov.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .apicov.env: {}", e);
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.apicov.toml (current directory)
    /// 2. ~/.apicov/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(ApiCovConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".apicov.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".apicov").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((ApiCovConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<ApiCovConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: ApiCovConfig) -> ApiCovConfig {
        if let Ok(flag) = std::env::var("APICOV_SHARED_TRACKING") {
            config.tracking.shared_tracking = parse_flag(&flag);
        }
        if let Ok(timeout) = std::env::var("APICOV_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                config.tracking.request_timeout_ms = ms;
            }
        }
        if let Ok(flag) = std::env::var("APICOV_ERROR_ON_STATUS") {
            config.tracking.error_on_status = parse_flag(&flag);
        }
        if let Ok(source) = std::env::var("APICOV_SPEC_SOURCE") {
            config.spec.source = Some(source);
        }
        if let Ok(name) = std::env::var("APICOV_JUNIT_SUITE_NAME") {
            config.reporting.junit_suite_name = name;
        }

        // RUST_LOG is read by init_tracing directly and takes precedence there.
        config
    }

    fn validate_config(config: &ApiCovConfig) -> Result<(), ConfigError> {
        match config.logging.level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other if other.contains('=') => {} // RUST_LOG style directives
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact",
                    other
                )))
            }
        }

        if let Some(p) = config
            .reporting
            .percentiles
            .iter()
            .find(|p| **p <= 0.0 || **p > 100.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "Percentile {} out of range (0, 100]",
                p
            )));
        }

        if !(0.0..=100.0).contains(&config.reporting.error_rate_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "Error rate threshold {} must be a percentage",
                config.reporting.error_rate_threshold
            )));
        }

        Ok(())
    }

    pub fn config(&self) -> &ApiCovConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = ApiCovConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
