//! Configuration loading and persistence.

use super::Config;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::Path;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // Instance id lands in the data directory path, so it must be a
        // plain non-empty name.
        if self.messenger.instance_id.is_empty() {
            errors.push("Messenger instance_id must not be empty".to_string());
        } else if self
            .messenger
            .instance_id
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
        {
            errors.push(format!(
                "Messenger instance_id '{}' must not contain whitespace or path separators",
                self.messenger.instance_id
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Load configuration from the default path, falling back to defaults
    /// if no file exists.
    pub fn load_or_default() -> Self {
        match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }
}
