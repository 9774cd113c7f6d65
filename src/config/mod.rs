//! Configuration management.
//!
//! cron8n configuration can come from:
//! - Environment variables (CRON8N_*)
//! - Settings file (~/.cron8n/settings.toml)
//!
//! Only the binary reads this; the stores receive their paths explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Timezone used when none is given.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// cron8n configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the auth config and the registry
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    /// Timezone for new workflows and cron previews
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Web UI configuration
    #[serde(default)]
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            default_timezone: default_timezone(),
            ui: UiConfig::default(),
        }
    }
}

/// Web UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_home_dir() -> PathBuf {
    dirs::home_dir()
        .map(|d| d.join(".cron8n"))
        .unwrap_or_else(|| PathBuf::from(".cron8n"))
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_port() -> u16 {
    3131
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        // CRON8N_HOME moves the settings file too
        if let Ok(home) = std::env::var("CRON8N_HOME") {
            config.home_dir = PathBuf::from(home);
        }

        let settings_path = config.settings_path();
        if let Ok(partial) = Self::load_partial_from_path(&settings_path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Path of the auth credential document.
    pub fn auth_path(&self) -> PathBuf {
        self.home_dir.join("config.json")
    }

    /// Path of the cross-project registry document.
    pub fn registry_path(&self) -> PathBuf {
        self.home_dir.join("registry.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home_dir.join("settings.toml")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(home) = std::env::var("CRON8N_HOME") {
            self.home_dir = PathBuf::from(home);
        }
        if let Ok(tz) = std::env::var("CRON8N_TIMEZONE") {
            if !tz.trim().is_empty() {
                self.default_timezone = tz.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("CRON8N_UI_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                self.ui.port = parsed;
            }
        }
        if let Ok(host) = std::env::var("CRON8N_UI_HOST") {
            self.ui.host = host;
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(home_dir) = partial.home_dir {
            self.home_dir = home_dir;
        }
        if let Some(tz) = partial.default_timezone {
            self.default_timezone = tz;
        }
        if let Some(ui) = partial.ui {
            self.ui = ui;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    home_dir: Option<PathBuf>,
    default_timezone: Option<String>,
    ui: Option<UiConfig>,
}
