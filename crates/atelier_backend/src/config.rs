//! Runtime configuration.

use atelier_core::GenerationKind;
use atelier_error::{AtelierError, AtelierResult, ConfigError};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Backend URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8188";

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_interval_ms() -> u64 {
    2_000
}

fn default_image_timeout_secs() -> u64 {
    120
}

fn default_video_timeout_secs() -> u64 {
    7_200
}

fn default_max_side() -> u32 {
    1024
}

/// Connection settings for the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL (e.g. `http://127.0.0.1:8188`)
    pub base_url: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Client id sent with submissions; random per client when absent
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl BackendConfig {
    /// Settings for a backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: default_request_timeout_secs(),
            client_id: None,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - `ATELIER_BACKEND_URL` (default: "http://127.0.0.1:8188")
    /// - `ATELIER_REQUEST_TIMEOUT_SECS` (optional)
    /// - `ATELIER_CLIENT_ID` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("ATELIER_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let request_timeout_secs = match std::env::var("ATELIER_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::new(format!("ATELIER_REQUEST_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => default_request_timeout_secs(),
        };
        let client_id = std::env::var("ATELIER_CLIENT_ID").ok();

        Ok(Self {
            base_url,
            request_timeout_secs,
            client_id,
        })
    }

    /// Set the client id
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Result polling cadence and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between history checks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Timeout for image kinds
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    /// Timeout for video kinds
    #[serde(default = "default_video_timeout_secs")]
    pub video_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            image_timeout_secs: default_image_timeout_secs(),
            video_timeout_secs: default_video_timeout_secs(),
        }
    }
}

impl PollingConfig {
    /// Delay between ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Timeout for a generation kind.
    pub fn timeout_for(&self, kind: GenerationKind) -> Duration {
        if kind.is_video() {
            Duration::from_secs(self.video_timeout_secs)
        } else {
            Duration::from_secs(self.image_timeout_secs)
        }
    }
}

/// Binding defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Long side for ratio-derived dimensions
    #[serde(default = "default_max_side")]
    pub max_side: u32,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            max_side: default_max_side(),
        }
    }
}

/// Top-level Atelier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AtelierConfig {
    /// Backend connection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Result polling
    #[serde(default)]
    pub polling: PollingConfig,
    /// Binding defaults
    #[serde(default)]
    pub binding: BindingConfig,
}

impl AtelierConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> AtelierResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                AtelierError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                AtelierError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> AtelierResult<Self> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| {
                AtelierError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Load configuration with precedence: user override > bundled default.
    ///
    /// Configuration sources in order of precedence (later sources override earlier):
    /// 1. Bundled defaults (atelier.toml shipped with the library)
    /// 2. User config in home directory (~/.config/atelier/atelier.toml)
    /// 3. User config in current directory (./atelier.toml)
    ///
    /// User config files are optional and silently skipped if not found.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use atelier_backend::AtelierConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = AtelierConfig::load()?;
    /// println!("backend at {}", config.backend.base_url);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument]
    pub fn load() -> AtelierResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../atelier.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/atelier/atelier.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("atelier").required(false));

        builder
            .build()
            .map_err(|e| {
                AtelierError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                AtelierError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// The bundled defaults, without user overrides.
    pub fn bundled() -> AtelierResult<Self> {
        Self::from_toml_str(include_str!("../../../atelier.toml"))
    }
}
