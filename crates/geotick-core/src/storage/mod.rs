mod config;

pub use config::{Config, ControllerConfig, LoggingConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/geotick[-dev]/` based on GEOTICK_ENV.
///
/// Set GEOTICK_ENV=dev to use development data directory.
/// GEOTICK_CONFIG_DIR overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("GEOTICK_CONFIG_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("GEOTICK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("geotick-dev")
            } else {
                base_dir.join("geotick")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::LoadFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
