//! The Messenger slave channel.
//!
//! Ties the chat cache, listener, outbound path, and operator commands
//! together behind [`SlaveChannel`].

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use courier_core::channel::{Coordinator, ExtraFunction, SlaveChannel};
use courier_core::config::ExperimentalFlags;
use courier_core::types::{Chat, Message, MessageId, ModuleId, MsgType, Status, ThreadId};
use courier_core::{CoreError, Result};

use crate::attachments::AttachmentClassifier;
use crate::chats::ChatManager;
use crate::client::{ListenerEvent, MessageData, MessengerClient, SentTracker};
use crate::extras::ExtraFunctions;
use crate::graphql::get_string;
use crate::listener::{message_from_data, Listener};
use crate::outbound::OutboundManager;

/// Module id the channel registers under.
pub const CHANNEL_ID: &str = "courier.messenger";

const CHANNEL_NAME: &str = "Facebook Messenger Slave";
const CHANNEL_EMOJI: &str = "⚡️";

const SUPPORTED_MESSAGE_TYPES: [MsgType; 10] = [
    MsgType::Text,
    MsgType::Image,
    MsgType::Sticker,
    MsgType::Animation,
    MsgType::Voice,
    MsgType::File,
    MsgType::Video,
    MsgType::Location,
    MsgType::Status,
    MsgType::Unsupported,
];

/// Facebook Messenger as a slave channel.
pub struct MessengerChannel {
    channel_id: ModuleId,
    client: Arc<dyn MessengerClient>,
    chats: Arc<ChatManager>,
    listener: Arc<Listener>,
    outbound: OutboundManager,
    extras: ExtraFunctions,
    classifier: AttachmentClassifier,
    events: Mutex<Option<mpsc::Receiver<ListenerEvent>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MessengerChannel {
    /// Builds the channel around a client, the coordinator to deliver
    /// through, and the transport's event stream. A non-empty `instance`
    /// qualifies the module id (`courier.messenger#work`) so several
    /// accounts can register side by side.
    pub fn new(
        client: Arc<dyn MessengerClient>,
        coordinator: Coordinator,
        events: mpsc::Receiver<ListenerEvent>,
        flags: ExperimentalFlags,
        instance: &str,
    ) -> Self {
        let channel_id = ModuleId::new(CHANNEL_ID).with_instance(instance);
        let tracker = SentTracker::new();
        let chats = Arc::new(ChatManager::new(client.clone(), flags.clone()));
        let listener = Arc::new(Listener::new(
            client.clone(),
            chats.clone(),
            coordinator,
            tracker.clone(),
            channel_id.clone(),
            flags.clone(),
        ));
        let outbound = OutboundManager::new(client.clone(), flags.clone(), tracker);
        let extras = ExtraFunctions::new(client.clone(), chats.clone());
        let classifier = AttachmentClassifier::new(client.clone(), flags);
        Self {
            channel_id,
            client,
            chats,
            listener,
            outbound,
            extras,
            classifier,
            events: Mutex::new(Some(events)),
            task: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SlaveChannel for MessengerChannel {
    fn channel_id(&self) -> &ModuleId {
        &self.channel_id
    }

    fn channel_name(&self) -> &str {
        CHANNEL_NAME
    }

    fn channel_emoji(&self) -> &str {
        CHANNEL_EMOJI
    }

    fn supported_message_types(&self) -> &[MsgType] {
        &SUPPORTED_MESSAGE_TYPES
    }

    async fn get_chats(&self) -> Result<Vec<Chat>> {
        Ok(self.chats.list_chats().await?)
    }

    async fn get_chat(&self, uid: &ThreadId) -> Result<Chat> {
        self.chats
            .get_thread(uid)
            .await
            .map(|chat| chat.as_ref().clone())
            .map_err(|error| {
                debug!(%error, chat = %uid, "chat lookup failed");
                CoreError::chat_not_found(uid)
            })
    }

    async fn get_chat_picture(&self, chat: &Chat) -> Result<Bytes> {
        debug!(chat = %chat.uid, "fetching chat picture");
        let mut photo_url = chat.vendor_str("profile_picture_url").map(str::to_string);
        if photo_url.is_none() {
            let info = self.client.fetch_thread_info(&chat.uid).await?;
            photo_url = get_string(&info, &["messaging_actor", "big_image_src", "uri"])
                .or_else(|| get_string(&info, &["image", "uri"]));
        }
        let photo_url = photo_url.ok_or_else(|| {
            CoreError::OperationNotSupported("This chat has no picture.".to_string())
        })?;
        let (data, _) = self.client.fetch_url(&photo_url).await?;
        Ok(data)
    }

    async fn send_message(&self, msg: Message) -> Result<Message> {
        self.outbound.send_message(msg).await
    }

    async fn send_status(&self, status: Status) -> Result<()> {
        match status {
            Status::MessageRemoval { message, .. } => {
                // Sub-message ids address one attachment of the original;
                // unsend works on the whole message.
                let mid = message.uid.without_index();
                self.client.unsend(&mid).await.map_err(|error| {
                    error!(%error, "Error occurred while sending status");
                    CoreError::OperationNotSupported(error.to_string())
                })
            }
            Status::ReactToMessage {
                msg_id, reaction, ..
            } => self.client.react(&msg_id, reaction).await.map_err(|error| {
                error!(%error, "Error occurred while sending status");
                CoreError::ReactionNotPossible(error.to_string())
            }),
            other => Err(CoreError::OperationNotSupported(format!(
                "status type {} is not supported",
                other.kind()
            ))),
        }
    }

    async fn get_message_by_id(&self, chat: &Chat, msg_id: &MessageId) -> Result<Message> {
        let (base, index) = msg_id.split_index();
        let node = self.client.fetch_message(&chat.uid, &base).await?;
        let data = MessageData::from_graphql(&node);
        let cached = self.chats.get_thread(&chat.uid).await?;

        let mut msg = message_from_data(&cached, &base, &data.author, &data);
        if !data.attachments.is_empty() {
            let attachment = data
                .attachments
                .get(index.unwrap_or(0))
                .ok_or_else(|| CoreError::message_not_found(msg_id))?;
            self.classifier.attach_media(&mut msg, attachment).await?;
        }
        msg.uid = match index {
            Some(i) => base.with_index(i),
            None => base,
        };
        Ok(msg)
    }

    async fn poll(&self) -> Result<()> {
        let events = match self.events.lock().take() {
            Some(events) => events,
            None => {
                return Err(CoreError::Channel(
                    "channel is already polling".to_string(),
                ))
            }
        };
        info!(channel = %self.channel_id, "starting listener");
        let handle = tokio::spawn(self.listener.clone().run(events));
        *self.task.lock() = Some(handle);
        Ok(())
    }

    async fn stop_polling(&self) -> Result<()> {
        if let Some(handle) = self.task.lock().take() {
            info!(channel = %self.channel_id, "stopping listener");
            handle.abort();
        }
        Ok(())
    }

    fn extra_functions(&self) -> &[ExtraFunction] {
        ExtraFunctions::descriptors()
    }

    async fn call_extra(&self, name: &str, args: &str) -> Result<String> {
        self.extras.call(name, args).await
    }
}
