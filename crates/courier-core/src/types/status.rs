//! Out-of-band status deliveries.

use super::identifiers::{MessageId, ModuleId, ThreadId};
use super::message::{Message, Reactions};

/// A status update travelling between master and slave sides.
///
/// `MessageRemoval` and `ReactToMessage` arrive from the master side;
/// `MessageReactionsUpdate` and `ChatUpdates` are emitted by the slave.
#[derive(Debug, Clone)]
pub enum Status {
    /// A message was removed and its counterpart should disappear too.
    MessageRemoval {
        source_module: ModuleId,
        message: Box<Message>,
    },
    /// Request to put (or clear) a reaction on a message.
    ReactToMessage {
        chat_uid: ThreadId,
        msg_id: MessageId,
        /// `None` removes the account's existing reaction.
        reaction: Option<String>,
    },
    /// Full replacement of the reactions on a message.
    MessageReactionsUpdate {
        chat_uid: ThreadId,
        msg_id: MessageId,
        reactions: Reactions,
    },
    /// Chats appeared, changed, or vanished on the slave side.
    ChatUpdates {
        module_id: ModuleId,
        new_chats: Vec<ThreadId>,
        modified_chats: Vec<ThreadId>,
        removed_chats: Vec<ThreadId>,
    },
}

impl Status {
    /// Name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Status::MessageRemoval { .. } => "message_removal",
            Status::ReactToMessage { .. } => "react_to_message",
            Status::MessageReactionsUpdate { .. } => "message_reactions_update",
            Status::ChatUpdates { .. } => "chat_updates",
        }
    }
}
