//! Persisted login session.
//!
//! Messenger authenticates through browser cookies. The session file is a
//! JSON array of cookie records exported from a logged-in browser; only
//! `c_user` (the account id) and `xs` (the session secret) are required.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use courier_core::types::ThreadId;

use crate::error::{MessengerError, Result};

/// One browser cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_domain() -> String {
    ".facebook.com".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

/// A login session backed by a set of cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    pub cookies: Vec<SessionCookie>,
}

impl Session {
    /// Parse a session from a JSON cookie array.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a session from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MessengerError::session(format!(
                "session file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save the session to a file path, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&temp_path, perms)?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Value of a cookie by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }

    /// Checks the session carries the cookies a login needs and returns
    /// the account id.
    pub fn account_id(&self) -> Result<ThreadId> {
        let mut missing = Vec::new();
        if self.cookie("xs").is_none() {
            missing.push("xs");
        }
        let c_user = match self.cookie("c_user") {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                missing.push("c_user");
                None
            }
        };
        if let Some(c_user) = c_user {
            if missing.is_empty() {
                return Ok(ThreadId::new(c_user));
            }
        }
        Err(MessengerError::session(format!(
            "missing required cookie(s): {}",
            missing.join(", ")
        )))
    }
}
