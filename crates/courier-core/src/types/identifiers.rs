//! Identifier newtypes used across the chat model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a channel module, e.g. `courier.messenger`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualified form a second instance registers under, e.g.
    /// `courier.messenger#work`. An empty instance name is the default
    /// instance and keeps the bare id.
    pub fn with_instance(&self, instance: &str) -> ModuleId {
        if instance.is_empty() {
            self.clone()
        } else {
            ModuleId(format!("{}#{}", self.0, instance))
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a chat thread or a user within the channel's namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a message within a chat.
///
/// A message that carried several attachments is fanned out into
/// sub-messages addressed as `{id}.{index}`, so the type knows how to
/// attach and strip a trailing numeric index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sub-message id for the `index`-th attachment of this message.
    pub fn with_index(&self, index: usize) -> MessageId {
        MessageId(format!("{}.{}", self.0, index))
    }

    /// Splits a trailing numeric index off the id, if one is present.
    ///
    /// `"mid.$abc.2"` becomes `("mid.$abc", Some(2))`, while an id whose
    /// last dot-separated segment is not a number is returned unchanged.
    pub fn split_index(&self) -> (MessageId, Option<usize>) {
        if let Some(pos) = self.0.rfind('.') {
            let tail = &self.0[pos + 1..];
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = tail.parse() {
                    return (MessageId(self.0[..pos].to_string()), Some(index));
                }
            }
        }
        (self.clone(), None)
    }

    /// The id with any trailing numeric index removed.
    pub fn without_index(&self) -> MessageId {
        self.split_index().0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
