//! Filesystem layout under `~/.courier`.

use crate::error::ConfigError;
use std::fs;
use std::path::PathBuf;

/// Base directory for all Courier data.
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".courier"))
}

/// Path of the configuration file.
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("courier.json5"))
}

/// Data directory of one channel instance.
pub fn data_dir(instance_id: &str) -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join(instance_id))
}

/// Path of the session cookie file for one channel instance.
pub fn session_file(instance_id: &str) -> Result<PathBuf, ConfigError> {
    Ok(data_dir(instance_id)?.join("session.json"))
}

/// Create the base and instance directories if they are missing.
pub fn ensure_dirs(instance_id: &str) -> Result<(), ConfigError> {
    fs::create_dir_all(data_dir(instance_id)?)?;
    Ok(())
}
