//! User configuration
//!
//! Read from `<config_dir>/wslm/config.toml` (or a path given on the command
//! line). Every key is optional; a missing file means defaults.
//!
//! ```toml
//! wsl_command = "wsl"
//! import_root = 'D:\WSL'
//! install_no_launch = true
//! install_settle_secs = 5
//! export_path = "wsl-distributions.json"
//!
//! [log]
//! level = "info"
//! retention_hours = 24
//! enabled = true
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::LifecycleSettings;
use crate::error::{Result, WslError};

/// Overrides `wsl_command`
pub const WSL_COMMAND_ENV: &str = "WSLM_WSL_COMMAND";

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub wsl_command: String,
    /// `None` means `<data_local_dir>/wslm/distributions`
    pub import_root: Option<PathBuf>,
    pub install_no_launch: bool,
    pub install_settle_secs: u64,
    pub export_path: PathBuf,
    pub log: LogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wsl_command: "wsl".to_string(),
            import_root: None,
            install_no_launch: true,
            install_settle_secs: 5,
            export_path: PathBuf::from("wsl-distributions.json"),
            log: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// trace, debug, info, warn, error or off
    pub level: String,
    pub retention_hours: u32,
    pub enabled: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            enabled: true,
        }
    }
}

impl LogSettings {
    /// Normalize a level name; unknown names fall back to the default
    pub fn parse_level(value: &str) -> &'static str {
        match value.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" => "error",
            "off" | "none" | "disabled" => "off",
            _ => DEFAULT_LOG_LEVEL,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => match default_config_path() {
                Some(path) => match Self::read(&path) {
                    Err(WslError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                        Self::default()
                    }
                    other => other?,
                },
                None => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| WslError::io(path, e))?;
        Self::parse(&content).map_err(|message| WslError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e: toml::de::Error| e.message().to_string())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        if let Ok(command) = env::var(WSL_COMMAND_ENV)
            && !command.trim().is_empty()
        {
            self.wsl_command = command;
        }
    }

    pub fn import_root(&self) -> PathBuf {
        self.import_root.clone().unwrap_or_else(default_import_root)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            import_root: self.import_root(),
            install_no_launch: self.install_no_launch,
            settle: Duration::from_secs(self.install_settle_secs),
            scratch_root: std::env::temp_dir(),
        }
    }
}

/// `<config_dir>/wslm/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wslm").join("config.toml"))
}

/// Base directory for everything wslm writes (logs, imported distributions)
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("wslm")
}

pub fn default_import_root() -> PathBuf {
    data_dir().join("distributions")
}
