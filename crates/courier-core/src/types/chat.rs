//! Chats and chat members.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identifiers::ThreadId;

/// Reserved member id for messages authored by the channel itself.
pub const SYSTEM_MEMBER_ID: &str = "__system__";

/// Kind of conversation a [`Chat`] represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[default]
    User,
    Group,
    System,
}

/// A participant of a chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    /// Member id within the channel's namespace.
    pub uid: ThreadId,
    /// Id of the chat this member belongs to.
    pub chat_uid: ThreadId,
    /// Display name as reported by the channel.
    pub name: String,
    /// Per-chat nickname, when one is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Whether this member is the logged-in account.
    #[serde(default)]
    pub is_self: bool,
    /// Whether this member stands in for the channel itself.
    #[serde(default)]
    pub is_system: bool,
}

impl ChatMember {
    pub fn new(chat_uid: ThreadId, uid: ThreadId, name: impl Into<String>) -> Self {
        Self {
            uid,
            chat_uid,
            name: name.into(),
            alias: None,
            is_self: false,
            is_system: false,
        }
    }

    /// Member entry for the logged-in account.
    pub fn self_member(chat_uid: ThreadId, uid: ThreadId, name: impl Into<String>) -> Self {
        Self {
            is_self: true,
            ..Self::new(chat_uid, uid, name)
        }
    }

    /// Member entry standing in for the channel itself.
    pub fn system_member(chat_uid: ThreadId) -> Self {
        Self {
            is_system: true,
            ..Self::new(chat_uid, ThreadId::new(SYSTEM_MEMBER_ID), "System")
        }
    }

    /// Nickname when set, otherwise the display name.
    pub fn display_name(&self) -> &str {
        match &self.alias {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }
}

/// A conversation on a slave channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Thread id within the channel's namespace.
    pub uid: ThreadId,
    /// Display name as reported by the channel.
    pub name: String,
    /// Per-chat nickname, when one is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub chat_type: ChatType,
    /// Known participants. One-to-one chats carry the counterpart and the
    /// logged-in account; group chats carry every participant reported.
    #[serde(default)]
    pub members: Vec<ChatMember>,
    /// Channel-specific details that do not fit the common model, such as
    /// profile picture URLs.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub vendor: Value,
}

impl Chat {
    pub fn new(uid: ThreadId, name: impl Into<String>, chat_type: ChatType) -> Self {
        Self {
            uid,
            name: name.into(),
            alias: None,
            chat_type,
            members: Vec::new(),
            vendor: Value::Null,
        }
    }

    /// Nickname when set, otherwise the display name.
    pub fn display_name(&self) -> &str {
        match &self.alias {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }

    pub fn get_member(&self, uid: &ThreadId) -> Option<&ChatMember> {
        self.members.iter().find(|m| &m.uid == uid)
    }

    /// The member entry for the logged-in account, if present.
    pub fn self_member(&self) -> Option<&ChatMember> {
        self.members.iter().find(|m| m.is_self)
    }

    /// The member entry standing in for the channel, adding one if needed.
    pub fn system_member(&mut self) -> ChatMember {
        if let Some(member) = self.members.iter().find(|m| m.is_system) {
            return member.clone();
        }
        let member = ChatMember::system_member(self.uid.clone());
        self.members.push(member.clone());
        member
    }

    pub fn add_member(&mut self, member: ChatMember) {
        self.members.push(member);
    }

    /// Reads a string out of the vendor-specific details.
    pub fn vendor_str(&self, key: &str) -> Option<&str> {
        self.vendor.get(key).and_then(Value::as_str)
    }

    /// Stores a vendor-specific detail, promoting `vendor` to an object if
    /// it was still null.
    pub fn set_vendor(&mut self, key: &str, value: impl Into<Value>) {
        if !self.vendor.is_object() {
            self.vendor = Value::Object(serde_json::Map::new());
        }
        if let Some(map) = self.vendor.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }
}
