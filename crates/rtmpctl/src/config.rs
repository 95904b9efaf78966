//! Translation from config file + global flags to a running controller.
//!
//! Flags win over the file; the file wins over built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use rtmpctl_config::{Config, FileAddressRepository};
use rtmpctl_core::{
    AddressRepository, ControllerConfig, DeviceAddress, MemoryAddressRepository,
    StreamController,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file path: `--config`, then the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(rtmpctl_config::config_path)
}

/// Load the config file, falling back to defaults if it cannot be read.
pub fn load_config_or_default(global: &GlobalOpts) -> Config {
    let path = config_path(global);
    rtmpctl_config::load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
        Config::default()
    })
}

/// Controller tuning with flag overrides applied.
pub fn controller_config(global: &GlobalOpts) -> ControllerConfig {
    let mut config = load_config_or_default(global).controller_config();
    if let Some(port) = global.port {
        config.device_port = port;
    }
    if let Some(ms) = global.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = global.interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    config
}

/// Address store: the config file, or a throwaway one for `--device`.
pub fn repository(global: &GlobalOpts) -> Result<Arc<dyn AddressRepository>, CliError> {
    if let Some(ref device) = global.device {
        let address = DeviceAddress::parse(device).map_err(|e| CliError::Validation {
            field: "--device".into(),
            reason: e.to_string(),
        })?;
        debug!(%address, "using device address from the command line");
        return Ok(Arc::new(MemoryAddressRepository::new(Some(address))));
    }
    Ok(Arc::new(FileAddressRepository::new(config_path(global))))
}

/// Build a controller; its startup probe is already running on return.
pub fn build_controller(global: &GlobalOpts) -> Result<StreamController, CliError> {
    let config = controller_config(global);
    let repository = repository(global)?;
    Ok(StreamController::new(config, repository)?)
}
