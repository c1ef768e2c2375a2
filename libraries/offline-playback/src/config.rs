/// Player configuration
use crate::error::{PlaybackError, Result};
use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub downloads: DownloadSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,

    /// `prev()` restarts the current entry when further in than this
    #[serde(default = "default_restart_threshold_ms")]
    pub restart_threshold_ms: u64,

    #[serde(default)]
    pub repeat: RepeatMode,

    #[serde(default)]
    pub shuffle: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadSettings {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_resource_timeout_secs")]
    pub resource_timeout_secs: u64,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Used when the URL path has no extension
    #[serde(default = "default_extension")]
    pub default_extension: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl PlayerConfig {
    /// Load from `config.toml` (if present) and `OFFLINE_PLAYER_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load from `path` (if present) and `OFFLINE_PLAYER_*` variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `OFFLINE_PLAYER_PLAYBACK__TELEMETRY_INTERVAL_MS=100`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut settings = config::Config::builder();

        if path.exists() {
            settings = settings.add_source(config::File::from(path.to_path_buf()));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("OFFLINE_PLAYER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, ignoring the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.telemetry_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "playback.telemetry_interval_ms must be positive".to_string(),
            ));
        }
        if self.downloads.request_timeout_secs == 0 || self.downloads.resource_timeout_secs == 0 {
            return Err(PlaybackError::Config(
                "download timeouts must be positive".to_string(),
            ));
        }
        if let Some(base) = &self.catalog.base_url {
            url::Url::parse(base)
                .map_err(|e| PlaybackError::Config(format!("catalog.base_url: {}", e)))?;
        }
        Ok(())
    }
}

impl PlaybackSettings {
    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }
}

impl DownloadSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_secs)
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            telemetry_interval_ms: default_telemetry_interval_ms(),
            restart_threshold_ms: default_restart_threshold_ms(),
            repeat: RepeatMode::Off,
            shuffle: false,
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            resource_timeout_secs: default_resource_timeout_secs(),
            cache_dir: default_cache_dir(),
            default_extension: default_extension(),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            app_name: default_app_name(),
        }
    }
}

// Default values
fn default_telemetry_interval_ms() -> u64 {
    250
}

fn default_restart_threshold_ms() -> u64 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_resource_timeout_secs() -> u64 {
    120
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("offline-player")
}

fn default_extension() -> String {
    "mp3".to_string()
}

fn default_app_name() -> String {
    "OfflinePlayer".to_string()
}
