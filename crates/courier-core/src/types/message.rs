//! Messages exchanged between the master and slave sides.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::chat::{Chat, ChatMember};
use super::identifiers::{MessageId, ModuleId, ThreadId};

/// Reactions a master channel may offer for this channel's messages,
/// in display order.
pub const SUGGESTED_REACTIONS: [&str; 7] = ["😍", "😆", "😮", "😢", "😠", "👍", "👎"];

/// Content type of a [`Message`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    #[default]
    Text,
    Image,
    Sticker,
    Animation,
    Voice,
    File,
    Video,
    Link,
    Location,
    Status,
    Unsupported,
}

/// Transient chat state reported through a [`MsgType::Status`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    Typing,
    UploadingImage,
    UploadingVoice,
    UploadingVideo,
    UploadingFile,
}

/// Typed payload accompanying certain message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MsgAttribute {
    Link {
        title: String,
        description: String,
        image: Option<String>,
        url: String,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Status {
        status_type: StatusType,
        /// How long the state remains valid, in milliseconds.
        timeout_ms: u64,
    },
}

/// Mention-style substitutions into a message's text, keyed by the byte
/// range `(start, end)` they cover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitutions(pub BTreeMap<(usize, usize), ChatMember>);

impl Substitutions {
    pub fn insert(&mut self, start: usize, end: usize, member: ChatMember) {
        self.0.insert((start, end), member);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(usize, usize), &ChatMember)> {
        self.0.iter()
    }
}

/// Reactions on a message, keyed by the reaction itself.
pub type Reactions = BTreeMap<String, Vec<ChatMember>>;

/// Media payload of a message, either in memory or behind a URL the
/// consumer fetches on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFile {
    Bytes(Bytes),
    Url(String),
}

/// A chat message in the common model.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub uid: MessageId,
    /// The chat the message belongs to. Carried by value so a message can
    /// outlive the cache entry it was built from.
    pub chat: Chat,
    pub author: ChatMember,
    pub text: String,
    pub msg_type: MsgType,
    pub attributes: Option<MsgAttribute>,
    pub filename: Option<String>,
    pub mime: Option<String>,
    pub file: Option<MediaFile>,
    /// The message this one quotes, built one level deep.
    pub target: Option<Box<Message>>,
    pub substitutions: Substitutions,
    pub reactions: Reactions,
    pub edit: bool,
    pub edit_media: bool,
    /// The module the message should be delivered to.
    pub deliver_to: ModuleId,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            uid: MessageId::new(""),
            chat: Chat::default(),
            author: ChatMember::default(),
            text: String::new(),
            msg_type: MsgType::Text,
            attributes: None,
            filename: None,
            mime: None,
            file: None,
            target: None,
            substitutions: Substitutions::default(),
            reactions: Reactions::default(),
            edit: false,
            edit_media: false,
            deliver_to: ModuleId::new("courier.master"),
        }
    }
}

impl Message {
    /// Shorthand for a plain text message.
    pub fn text(uid: MessageId, chat: Chat, author: ChatMember, text: impl Into<String>) -> Self {
        Self {
            uid,
            chat,
            author,
            text: text.into(),
            ..Self::default()
        }
    }

    /// The chat's thread id.
    pub fn chat_uid(&self) -> &ThreadId {
        &self.chat.uid
    }
}
