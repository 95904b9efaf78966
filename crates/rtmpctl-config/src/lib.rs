//! Configuration file for rtmpctl.
//!
//! A small TOML file with a single `[Settings]` table. The `IP` key holds
//! the device address; the remaining keys tune polling and timeouts.
//! [`FileAddressRepository`] plugs the file into the controller so the
//! address survives restarts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use rtmpctl_api::{DEFAULT_PORT, DeviceAddress};
use rtmpctl_core::{AddressRepository, ControllerConfig, CoreError};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        Self::Repository(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(rename = "Settings", default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Device IPv4 address. Missing means "use loopback"; empty means unset.
    #[serde(rename = "IP", default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(rename = "Port", default = "default_port")]
    pub port: u16,

    #[serde(rename = "PollIntervalMs", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(rename = "TimeoutMs", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ip: None,
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_timeout_ms() -> u64 {
    500
}

impl Config {
    /// Resolve the configured device address.
    ///
    /// A missing `IP` key yields the loopback device and an empty one yields
    /// `None`. Anything else must be a valid dotted-quad.
    pub fn device_address(&self) -> Result<Option<DeviceAddress>, ConfigError> {
        let port = self.settings.port;
        match self.settings.ip.as_deref().map(str::trim) {
            None => Ok(Some(DeviceAddress::LOOPBACK.with_port(port))),
            Some("") => Ok(None),
            Some(ip) => DeviceAddress::parse(ip)
                .map(|addr| Some(addr.with_port(port)))
                .map_err(|e| ConfigError::Validation {
                    field: "IP".into(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn set_address(&mut self, address: &DeviceAddress) {
        self.settings.ip = Some(address.ip().to_string());
    }

    /// Controller tuning derived from the file.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            poll_interval: Duration::from_millis(self.settings.poll_interval_ms),
            request_timeout: Duration::from_millis(self.settings.timeout_ms),
            device_port: self.settings.port,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "rtmpctl", "rtmpctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("rtmpctl");
    p
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load the config at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

/// Serialize the whole config to TOML and write it to `path`.
pub fn save_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(cfg)?;
    write_file(path, &toml_str)
}

/// Rewrite the `IP` key in place, leaving every other key as it was.
///
/// A file that does not parse is replaced rather than patched.
pub fn save_address(path: &Path, address: &DeviceAddress) -> Result<(), ConfigError> {
    let mut table = match std::fs::read_to_string(path) {
        Ok(text) => text.parse::<toml::Table>().unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "replacing unparseable config file");
            toml::Table::new()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
        Err(e) => return Err(e.into()),
    };

    let settings = table
        .entry("Settings")
        .or_insert(toml::Value::Table(toml::Table::new()));
    if !settings.is_table() {
        *settings = toml::Value::Table(toml::Table::new());
    }
    if let Some(settings) = settings.as_table_mut() {
        settings.insert("IP".into(), toml::Value::String(address.ip().to_string()));
    }

    let toml_str = toml::to_string_pretty(&table)?;
    write_file(path, &toml_str)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    debug!(path = %path.display(), "config written");
    Ok(())
}

// ── Address repository ──────────────────────────────────────────────

/// Device address persisted in the config file.
#[derive(Debug, Clone)]
pub struct FileAddressRepository {
    path: PathBuf,
}

impl FileAddressRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AddressRepository for FileAddressRepository {
    /// Never fails: an unreadable file or a bad `IP` falls back to loopback.
    fn load(&self) -> Result<Option<DeviceAddress>, CoreError> {
        let resolved = load_config(&self.path).and_then(|cfg| cfg.device_address());
        match resolved {
            Ok(address) => Ok(address),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "falling back to {}", DeviceAddress::LOOPBACK
                );
                Ok(Some(DeviceAddress::LOOPBACK))
            }
        }
    }

    fn save(&self, address: &DeviceAddress) -> Result<(), CoreError> {
        save_address(&self.path, address)?;
        Ok(())
    }
}
