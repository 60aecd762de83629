//! # Engine Configuration
//!
//! Configuration for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ATRIUM_API_URL=https://portal.school.edu/api                       │
//! │     ATRIUM_TIMEOUT_SECS=10                                             │
//! │     ATRIUM_PAGE_SIZE=50                                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/atrium/atrium.toml (Linux)                               │
//! │     ~/Library/Application Support/edu.Atrium.atrium (macOS)            │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost backend, 50-entry pages, generated device id             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # atrium.toml
//! [api]
//! base_url = "https://portal.school.edu/api"
//! timeout_secs = 30
//! page_size = 50
//!
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Dana's phone"
//!
//! [sync]
//! tap_refresh_delay_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use atrium_core::DEFAULT_NOTIFICATIONS_PAGE_SIZE;

use crate::error::{SyncError, SyncResult};

/// Largest page size the unread derivation will request.
const MAX_PAGE_SIZE: u32 = 200;

// =============================================================================
// Settings Sections
// =============================================================================

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL of the portal backend (no trailing slash required).
    pub base_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Page size used when deriving the unread count from page 1.
    pub page_size: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
            page_size: DEFAULT_NOTIFICATIONS_PAGE_SIZE,
        }
    }
}

/// Device identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Stable install identifier, generated on first run.
    /// Used for logging only; the push token is the delivery address.
    pub id: String,

    /// Optional human-readable device name.
    pub name: Option<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            id: Uuid::new_v4().to_string(),
            name: None,
        }
    }
}

/// Synchronization timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Delay before the full refresh scheduled by a notification tap.
    /// Gives the backend time to record the delivery before we re-derive.
    pub tap_refresh_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            tap_refresh_delay_ms: 1_000,
        }
    }
}

// =============================================================================
// Portal Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Backend API settings.
    pub api: ApiSettings,

    /// Device identity.
    pub device: DeviceSettings,

    /// Synchronization timing.
    pub sync: SyncSettings,
}

impl PortalConfig {
    /// Loads configuration from the given file (or the default location),
    /// then applies environment overrides.
    ///
    /// A missing file yields defaults; an unreadable or unparsable file is
    /// logged and yields defaults rather than blocking startup.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let resolved = path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);

        let mut config = match resolved {
            Some(ref file) if file.exists() => match Self::load_from(file) {
                Ok(config) => {
                    debug!(path = %file.display(), "Loaded config file");
                    config
                }
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Config file unusable; using defaults");
                    PortalConfig::default()
                }
            },
            _ => PortalConfig::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// Loads configuration from a specific TOML file.
    pub fn load_from(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::ConfigLoadFailed(e.to_string()))?;
        Ok(toml::from_str(&raw)?)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        Ok(())
    }

    /// Default config file location for this platform.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("edu", "Atrium", "atrium")
            .map(|dirs| dirs.config_dir().join("atrium.toml"))
    }

    /// Default token store location for this platform.
    pub fn default_storage_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("edu", "Atrium", "atrium")
            .map(|dirs| dirs.data_dir().join("atrium.db"))
    }

    /// Validates the configuration.
    ///
    /// ## Checks
    /// - Base URL parses as an absolute http(s) URL
    /// - Page size is within (0, 200]
    /// - Timeout is non-zero
    pub fn validate(&self) -> SyncResult<()> {
        let url = Url::parse(&self.api.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                url.scheme()
            )));
        }

        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::InvalidConfig(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.api.page_size
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "timeout_secs must be non-zero".into(),
            ));
        }

        Ok(())
    }

    /// The tap-triggered refresh delay as a [`Duration`].
    pub fn tap_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.sync.tap_refresh_delay_ms)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("ATRIUM_API_URL") {
            if !value.trim().is_empty() {
                self.api.base_url = value;
            }
        }
        if let Ok(value) = std::env::var("ATRIUM_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(parsed) => self.api.timeout_secs = parsed,
                Err(_) => warn!(%value, "Ignoring unparsable ATRIUM_TIMEOUT_SECS"),
            }
        }
        if let Ok(value) = std::env::var("ATRIUM_PAGE_SIZE") {
            match value.parse::<u32>() {
                Ok(parsed) => self.api.page_size = parsed,
                Err(_) => warn!(%value, "Ignoring unparsable ATRIUM_PAGE_SIZE"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PortalConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api.page_size, DEFAULT_NOTIFICATIONS_PAGE_SIZE);
        assert_eq!(config.tap_refresh_delay(), Duration::from_millis(1_000));
        // Generated device id is a parsable UUID.
        Uuid::parse_str(&config.device.id).unwrap();
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = PortalConfig::default();
        config.api.page_size = 0;
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));

        let mut config = PortalConfig::default();
        config.api.base_url = "ftp://example.com".into();
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));

        let mut config = PortalConfig::default();
        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PortalConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://portal.school.edu/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://portal.school.edu/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.sync.tap_refresh_delay_ms, 1_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PortalConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let back: PortalConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.api.base_url, config.api.base_url);
        assert_eq!(back.device.id, config.device.id);
    }
}
