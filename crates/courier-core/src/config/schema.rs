//! Configuration schema.

use serde::{Deserialize, Serialize};

/// Root configuration, stored as JSON5 at `~/.courier/courier.json5`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub messenger: MessengerConfig,
    pub logging: LoggingConfig,
}

/// Settings for the Messenger slave channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    /// Instance id, used to keep session data of multiple accounts apart.
    pub instance_id: String,
    pub flags: ExperimentalFlags,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
            flags: ExperimentalFlags::default(),
        }
    }
}

fn default_instance_id() -> String {
    "messenger".to_string()
}

/// Experimental behavior switches.
///
/// Unknown keys are rejected at load time so a typo does not silently
/// fall back to the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentalFlags {
    /// Leave media and share links on Facebook's redirect/proxy endpoints
    /// instead of unwrapping them to the destination URL.
    pub proxy_links_by_facebook: bool,
    /// Render shared links with their title, description and preview
    /// image instead of the bare URL.
    pub send_link_with_description: bool,
    /// Include message requests in the chat list.
    pub show_pending_threads: bool,
    /// Include archived conversations in the chat list.
    pub show_archived_threads: bool,
}

impl Default for ExperimentalFlags {
    fn default() -> Self {
        Self {
            proxy_links_by_facebook: true,
            send_link_with_description: false,
            show_pending_threads: false,
            show_archived_threads: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Log verbosity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
