//! Client surface the channel programs against.
//!
//! The Messenger wire protocol lives behind [`MessengerClient`]; the
//! channel only consumes the calls below plus a stream of
//! [`ListenerEvent`]s fed by the transport.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use courier_core::types::{MessageId, ThreadId};

use crate::error::Result;
use crate::graphql::{get_str, get_string, get_value};

/// Folder a thread is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadLocation {
    Inbox,
    Pending,
    Archived,
    Other,
}

impl ThreadLocation {
    /// Tag value used in thread list queries.
    pub fn tag(&self) -> &'static str {
        match self {
            ThreadLocation::Inbox => "INBOX",
            ThreadLocation::Pending => "PENDING",
            ThreadLocation::Archived => "ARCHIVED",
            ThreadLocation::Other => "OTHER",
        }
    }
}

/// Size of an emoji sent on its own, mapped onto the Like sticker set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmojiSize {
    Small,
    Medium,
    Large,
}

/// Sticker pack holding the thumbs-up sticker in its three sizes.
pub const LIKE_STICKER_PACK: &str = "227877430692340";

impl EmojiSize {
    /// Sticker id of the Like sticker in this size.
    pub fn sticker_id(&self) -> &'static str {
        match self {
            EmojiSize::Small => "369239263222822",
            EmojiSize::Medium => "369239343222814",
            EmojiSize::Large => "369239383222810",
        }
    }

    pub fn from_sticker_id(id: &str) -> Option<Self> {
        match id {
            "369239263222822" => Some(EmojiSize::Small),
            "369239343222814" => Some(EmojiSize::Medium),
            "369239383222810" => Some(EmojiSize::Large),
            _ => None,
        }
    }

    /// Size letter used in `{emoji}S` style send shortcuts and appended
    /// to inbound oversized emoji.
    pub fn letter(&self) -> char {
        match self {
            EmojiSize::Small => 'S',
            EmojiSize::Medium => 'M',
            EmojiSize::Large => 'L',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'S' => Some(EmojiSize::Small),
            'M' => Some(EmojiSize::Medium),
            'L' => Some(EmojiSize::Large),
            _ => None,
        }
    }

    /// Reads the size out of a message's tag list, where it appears as
    /// `hot_emoji_size:small` or `hot_emoji_size:s`.
    pub fn from_tags(tags: &[String]) -> Option<Self> {
        for tag in tags {
            if let Some(size) = tag.strip_prefix("hot_emoji_size:") {
                return match size {
                    "small" | "s" => Some(EmojiSize::Small),
                    "medium" | "m" => Some(EmojiSize::Medium),
                    "large" | "l" => Some(EmojiSize::Large),
                    _ => None,
                };
            }
        }
        None
    }
}

/// A user mentioned inside a message's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub user_id: ThreadId,
    /// Offset of the mention within the text.
    pub offset: usize,
    /// Length of the mentioned span.
    pub length: usize,
}

/// A message to be sent out, before it is handed to the transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub text: Option<String>,
    pub mentions: Vec<Mention>,
    pub reply_to_id: Option<MessageId>,
    pub sticker_id: Option<String>,
    pub emoji_size: Option<EmojiSize>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn sticker(sticker_id: impl Into<String>) -> Self {
        Self {
            sticker_id: Some(sticker_id.into()),
            ..Self::default()
        }
    }
}

/// A file to be uploaded alongside a message.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub mime: String,
    pub data: Bytes,
}

/// Typed payload of an inbound message event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageData {
    pub author: ThreadId,
    pub text: String,
    pub mentions: Vec<Mention>,
    pub emoji_size: Option<EmojiSize>,
    pub reply_to_id: Option<MessageId>,
    /// The quoted message, one level deep.
    pub replied_to: Option<Box<MessageData>>,
    /// Reactions by user id.
    pub reactions: BTreeMap<ThreadId, String>,
    /// Raw attachment records as carried by the event.
    pub attachments: Vec<Value>,
}

impl Default for MessageData {
    fn default() -> Self {
        Self {
            author: ThreadId::new(""),
            text: String::new(),
            mentions: Vec::new(),
            emoji_size: None,
            reply_to_id: None,
            replied_to: None,
            reactions: BTreeMap::new(),
            attachments: Vec::new(),
        }
    }
}

impl MessageData {
    /// Builds the payload from a GraphQL message node, as returned by a
    /// message fetch.
    pub fn from_graphql(data: &Value) -> Self {
        let mut mentions = Vec::new();
        if let Some(ranges) = get_value(data, &["message", "ranges"]).and_then(Value::as_array) {
            for range in ranges {
                let id = get_str(range, &["entity", "id"]);
                let offset = range.get("offset").and_then(Value::as_u64);
                let length = range.get("length").and_then(Value::as_u64);
                if let (Some(id), Some(offset), Some(length)) = (id, offset, length) {
                    mentions.push(Mention {
                        user_id: ThreadId::new(id),
                        offset: offset as usize,
                        length: length as usize,
                    });
                }
            }
        }

        let tags: Vec<String> = get_value(data, &["tags_list"])
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut reactions = BTreeMap::new();
        if let Some(entries) = get_value(data, &["message_reactions"]).and_then(Value::as_array) {
            for entry in entries {
                let user = get_str(entry, &["user", "id"]);
                let reaction = get_str(entry, &["reaction"]);
                if let (Some(user), Some(reaction)) = (user, reaction) {
                    reactions.insert(ThreadId::new(user), reaction.to_string());
                }
            }
        }

        let replied_to = get_value(data, &["replied_to_message", "message"])
            .map(|quoted| Box::new(Self::from_graphql(quoted)));
        let reply_to_id = get_string(data, &["replied_to_message", "message", "message_id"])
            .map(MessageId::new);

        // Attachments of a fetched message sit under `delta`; search
        // results carry bare blobs instead.
        let attachments = get_value(data, &["delta", "attachments"])
            .or_else(|| get_value(data, &["blob_attachments"]))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            author: ThreadId::new(get_str(data, &["message_sender", "id"]).unwrap_or("")),
            text: get_string(data, &["message", "text"]).unwrap_or_default(),
            mentions,
            emoji_size: EmojiSize::from_tags(&tags),
            reply_to_id,
            replied_to,
            reactions,
            attachments,
        }
    }
}

/// An event pushed by the transport's listener.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    /// A new message arrived.
    Message {
        mid: MessageId,
        author_id: ThreadId,
        thread_id: ThreadId,
        message: MessageData,
    },
    /// Someone put a reaction on a message.
    ReactionAdded { mid: MessageId, thread_id: ThreadId },
    /// Someone withdrew a reaction from a message.
    ReactionRemoved { mid: MessageId, thread_id: ThreadId },
    /// A message was unsent.
    MessageUnsent {
        mid: MessageId,
        author_id: ThreadId,
        thread_id: ThreadId,
    },
    /// The server asked for a thread to be re-fetched.
    ThreadRefresh { thread_id: ThreadId },
    /// The listener hit an error it could not attribute to a message.
    ListenerError { error: String },
    /// Bookkeeping update about a thread's timestamps.
    ChatTimestamp { thread_id: ThreadId },
}

/// Messenger operations the channel relies on.
///
/// Query calls return raw GraphQL dicts; the channel keeps the parsing
/// to itself so transports stay thin.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessengerClient: Send + Sync {
    /// Account id of the logged-in user.
    fn own_id(&self) -> ThreadId;

    /// Most recent threads, newest first. `limit` must be within
    /// `1..=20`; `before` pages by last-message timestamp (ms).
    async fn fetch_thread_list(
        &self,
        limit: usize,
        before: Option<i64>,
        locations: &[ThreadLocation],
    ) -> Result<Vec<Value>>;

    /// Thread info dict for one thread.
    async fn fetch_thread_info(&self, thread_id: &ThreadId) -> Result<Value>;

    /// Message node for one message.
    async fn fetch_message(&self, thread_id: &ThreadId, mid: &MessageId) -> Result<Value>;

    /// Resolves an image attachment id to a downloadable URL.
    async fn fetch_image_url(&self, attachment_id: &str) -> Result<String>;

    /// All users the account has talked to.
    async fn fetch_users(&self) -> Result<Vec<Value>>;

    /// Downloads a URL, returning the body and its content type.
    async fn fetch_url(&self, url: &str) -> Result<(Bytes, Option<String>)>;

    /// Sends a message, returning the id assigned by the server.
    async fn send(&self, message: OutgoingMessage, thread_id: &ThreadId) -> Result<MessageId>;

    /// Uploads files and sends them attached to a message.
    async fn send_files(
        &self,
        files: Vec<FileUpload>,
        message: OutgoingMessage,
        thread_id: &ThreadId,
        voice_clip: bool,
    ) -> Result<MessageId>;

    /// Sends a pinned location.
    async fn send_pinned_location(
        &self,
        latitude: f64,
        longitude: f64,
        message: OutgoingMessage,
        thread_id: &ThreadId,
    ) -> Result<MessageId>;

    /// Puts a reaction on a message, or clears it when `reaction` is
    /// `None`.
    async fn react(&self, mid: &MessageId, reaction: Option<String>) -> Result<()>;

    /// Unsends a message previously sent by this account.
    async fn unsend(&self, mid: &MessageId) -> Result<()>;

    /// Shows or clears the typing indicator in a thread.
    async fn set_typing(&self, thread_id: &ThreadId, typing: bool) -> Result<()>;

    /// Acknowledges delivery of a message.
    async fn mark_delivered(&self, thread_id: &ThreadId, mid: &MessageId) -> Result<()>;

    /// Marks a thread read.
    async fn mark_read(&self, thread_id: &ThreadId) -> Result<()>;

    /// Marks the account's inbox seen.
    async fn mark_seen(&self) -> Result<()>;

    async fn search_users(&self, query: &str, limit: usize) -> Result<Vec<Value>>;

    async fn search_groups(&self, query: &str, limit: usize) -> Result<Vec<Value>>;

    async fn search_pages(&self, query: &str, limit: usize) -> Result<Vec<Value>>;

    async fn search_threads(&self, query: &str, limit: usize) -> Result<Vec<Value>>;

    /// Adds users to a group thread.
    async fn add_group_members(&self, thread_id: &ThreadId, user_ids: &[ThreadId]) -> Result<()>;

    /// Removes a user from a group thread.
    async fn remove_group_member(&self, thread_id: &ThreadId, user_id: &ThreadId) -> Result<()>;

    /// Sets a user's nickname within a thread.
    async fn set_nickname(
        &self,
        thread_id: &ThreadId,
        user_id: &ThreadId,
        nickname: &str,
    ) -> Result<()>;

    /// Renames a group thread.
    async fn set_group_title(&self, thread_id: &ThreadId, title: &str) -> Result<()>;

    /// Sets a thread's quick-reaction emoji.
    async fn set_chat_emoji(&self, thread_id: &ThreadId, emoji: &str) -> Result<()>;
}

/// Records messages this account sent, so the listener can tell its own
/// traffic apart from everyone else's, and remembers how many
/// attachments each delivered message was fanned out into.
#[derive(Debug, Clone, Default)]
pub struct SentTracker {
    sent: Arc<DashSet<MessageId>>,
    attachment_counts: Arc<DashMap<MessageId, usize>>,
}

impl SentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers a message id this account just sent.
    pub fn record_sent(&self, mid: &MessageId) {
        self.sent.insert(mid.clone());
    }

    /// Consumes a sent-message record, returning whether it existed.
    pub fn take_sent(&self, mid: &MessageId) -> bool {
        self.sent.remove(mid).is_some()
    }

    /// Remembers how many sub-messages `mid` was delivered as.
    pub fn record_attachment_count(&self, mid: MessageId, count: usize) {
        self.attachment_counts.insert(mid, count);
    }

    pub fn attachment_count(&self, mid: &MessageId) -> Option<usize> {
        self.attachment_counts.get(mid).map(|entry| *entry)
    }
}
