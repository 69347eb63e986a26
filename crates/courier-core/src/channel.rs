//! Slave channel trait and the coordinator handle channels deliver through.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{CoreError, Result};
use crate::types::{
    Chat, Message, MessageId, ModuleId, MsgType, Status, ThreadId, SUGGESTED_REACTIONS,
};

/// Descriptor of an operator command a channel exposes beyond plain
/// messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraFunction {
    /// Name the command is invoked by.
    pub name: &'static str,
    /// Human-readable name shown in menus.
    pub display_name: &'static str,
    /// Help text, including a usage line.
    pub description: &'static str,
}

/// A channel bridging one IM network into the common chat model.
///
/// Implementations deliver inbound traffic through a [`Coordinator`] and
/// receive outbound traffic through `send_message` / `send_status`.
#[async_trait]
pub trait SlaveChannel: Send + Sync {
    /// Stable module id, e.g. `courier.messenger`.
    fn channel_id(&self) -> &ModuleId;

    /// Human-readable channel name.
    fn channel_name(&self) -> &str;

    /// Emoji shown next to the channel name.
    fn channel_emoji(&self) -> &str;

    /// Message types this channel can deliver outbound.
    fn supported_message_types(&self) -> &[MsgType];

    /// Reactions a master channel should offer for this channel's
    /// messages, in display order.
    fn suggested_reactions(&self) -> &[&str] {
        &SUGGESTED_REACTIONS
    }

    /// All chats the account can currently see.
    async fn get_chats(&self) -> Result<Vec<Chat>>;

    /// A single chat by thread id.
    async fn get_chat(&self, uid: &ThreadId) -> Result<Chat>;

    /// Raw profile picture bytes for a chat.
    async fn get_chat_picture(&self, chat: &Chat) -> Result<Bytes>;

    /// Sends a message out through the channel. Returns the message with
    /// its uid replaced by the id assigned on the network.
    async fn send_message(&self, msg: Message) -> Result<Message>;

    /// Applies a status update (removal, reaction) on the network.
    async fn send_status(&self, status: Status) -> Result<()>;

    /// Rebuilds a previously delivered message from the network.
    async fn get_message_by_id(&self, chat: &Chat, msg_id: &MessageId) -> Result<Message>;

    /// Starts consuming events from the network. Returns once consumption
    /// is running.
    async fn poll(&self) -> Result<()>;

    /// Stops consuming events. Safe to call more than once.
    async fn stop_polling(&self) -> Result<()>;

    /// Operator commands this channel exposes.
    fn extra_functions(&self) -> &[ExtraFunction] {
        &[]
    }

    /// Invokes an operator command by name with a raw argument string.
    async fn call_extra(&self, name: &str, args: &str) -> Result<String> {
        let _ = args;
        Err(CoreError::OperationNotSupported(format!(
            "unknown extra function {name}"
        )))
    }
}

/// Sending half of the master-side delivery channel.
///
/// Cheap to clone; every clone feeds the same [`CoordinatorReceiver`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    message_tx: mpsc::Sender<Message>,
    status_tx: mpsc::Sender<Status>,
}

/// Receiving half of the master-side delivery channel.
#[derive(Debug)]
pub struct CoordinatorReceiver {
    pub messages: mpsc::Receiver<Message>,
    pub statuses: mpsc::Receiver<Status>,
}

impl Coordinator {
    /// Creates a coordinator pair with the given buffer capacity.
    pub fn channel(capacity: usize) -> (Coordinator, CoordinatorReceiver) {
        let (message_tx, messages) = mpsc::channel(capacity);
        let (status_tx, statuses) = mpsc::channel(capacity);
        (
            Coordinator {
                message_tx,
                status_tx,
            },
            CoordinatorReceiver { messages, statuses },
        )
    }

    /// Delivers an inbound message to the master side.
    pub async fn send_message(&self, msg: Message) -> Result<()> {
        self.message_tx
            .send(msg)
            .await
            .map_err(|_| CoreError::Delivery("coordinator message channel closed".to_string()))
    }

    /// Delivers a status update to the master side.
    pub async fn send_status(&self, status: Status) -> Result<()> {
        self.status_tx
            .send(status)
            .await
            .map_err(|_| CoreError::Delivery("coordinator status channel closed".to_string()))
    }
}
