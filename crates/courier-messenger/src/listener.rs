//! Inbound event handling.
//!
//! The transport pushes [`ListenerEvent`]s into a channel; the listener
//! drains it, builds messages and statuses in the common model, and
//! hands them to the coordinator.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use courier_core::channel::Coordinator;
use courier_core::config::ExperimentalFlags;
use courier_core::types::{
    Chat, ChatMember, Message, MessageId, ModuleId, Reactions, Status, ThreadId,
};
use courier_core::Result as CoreResult;

use crate::attachments::AttachmentClassifier;
use crate::chats::ChatManager;
use crate::client::{ListenerEvent, MessageData, MessengerClient, SentTracker};

/// Grace period before an inbound message is processed. Events can beat
/// the send call's return, so without it the dedup check would miss our
/// own messages.
const MESSAGE_SETTLE_MS: u64 = 250;

/// Drains transport events and delivers them to the master side.
pub struct Listener {
    client: Arc<dyn MessengerClient>,
    chats: Arc<ChatManager>,
    classifier: AttachmentClassifier,
    coordinator: Coordinator,
    tracker: SentTracker,
    channel_id: ModuleId,
}

impl Listener {
    pub fn new(
        client: Arc<dyn MessengerClient>,
        chats: Arc<ChatManager>,
        coordinator: Coordinator,
        tracker: SentTracker,
        channel_id: ModuleId,
        flags: ExperimentalFlags,
    ) -> Self {
        Self {
            classifier: AttachmentClassifier::new(client.clone(), flags),
            client,
            chats,
            coordinator,
            tracker,
            channel_id,
        }
    }

    /// Consumes events until the transport closes its sender.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ListenerEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("listener event stream closed");
    }

    async fn handle_event(&self, event: ListenerEvent) {
        match event {
            ListenerEvent::Message {
                mid,
                author_id,
                thread_id,
                message,
            } => {
                if let Err(error) = self.on_message(mid, author_id, thread_id, message).await {
                    error!(%error, "failed to deliver inbound message");
                }
            }
            ListenerEvent::ReactionAdded { mid, thread_id }
            | ListenerEvent::ReactionRemoved { mid, thread_id } => {
                if let Err(error) = self.on_reaction(mid, thread_id).await {
                    error!(%error, "failed to deliver reaction update");
                }
            }
            ListenerEvent::MessageUnsent {
                mid,
                author_id,
                thread_id,
            } => {
                if let Err(error) = self.on_unsent(mid, author_id, thread_id).await {
                    error!(%error, "failed to deliver message removal");
                }
            }
            ListenerEvent::ThreadRefresh { thread_id } => {
                if let Err(error) = self.on_thread_refresh(thread_id).await {
                    error!(%error, "failed to deliver chat update");
                }
            }
            ListenerEvent::ListenerError { error } => {
                error!(%error, "listener reported an error");
            }
            ListenerEvent::ChatTimestamp { thread_id } => {
                debug!(thread = %thread_id, "thread timestamp update");
            }
        }
    }

    async fn on_message(
        &self,
        mid: MessageId,
        author_id: ThreadId,
        thread_id: ThreadId,
        data: MessageData,
    ) -> CoreResult<()> {
        sleep(Duration::from_millis(MESSAGE_SETTLE_MS)).await;
        if self.tracker.take_sent(&mid) {
            debug!(mid = %mid, "skipping message sent by this account");
            return Ok(());
        }

        let msg = self.build_message(&mid, &author_id, &thread_id, &data).await?;

        if data.attachments.len() > 1 {
            // Fan the message out into one sub-message per attachment,
            // remembering the count so an unsend can address them all.
            self.tracker
                .record_attachment_count(mid.clone(), data.attachments.len());
            for (index, attachment) in data.attachments.iter().enumerate() {
                let mut sub = msg.clone();
                sub.uid = mid.with_index(index);
                self.classifier.attach_media(&mut sub, attachment).await?;
                self.coordinator.send_message(sub).await?;
            }
        } else {
            let mut msg = msg;
            if let Some(attachment) = data.attachments.first() {
                self.classifier.attach_media(&mut msg, attachment).await?;
            }
            self.coordinator.send_message(msg).await?;
        }

        if let Err(error) = self.client.mark_delivered(&thread_id, &mid).await {
            debug!(%error, "failed to mark message delivered");
        }
        Ok(())
    }

    async fn build_message(
        &self,
        mid: &MessageId,
        author_id: &ThreadId,
        thread_id: &ThreadId,
        data: &MessageData,
    ) -> CoreResult<Message> {
        let chat = self.chats.get_thread(thread_id).await?;
        Ok(message_from_data(&chat, mid, author_id, data))
    }

    async fn on_reaction(&self, mid: MessageId, thread_id: ThreadId) -> CoreResult<()> {
        let node = self.client.fetch_message(&thread_id, &mid).await?;
        let data = MessageData::from_graphql(&node);
        let chat = self.chats.get_thread(&thread_id).await?;
        let reactions = build_reactions(&chat, &data);

        self.coordinator
            .send_status(Status::MessageReactionsUpdate {
                chat_uid: thread_id,
                msg_id: mid,
                reactions,
            })
            .await
    }

    async fn on_unsent(
        &self,
        mid: MessageId,
        author_id: ThreadId,
        thread_id: ThreadId,
    ) -> CoreResult<()> {
        let chat = self.chats.get_thread(&thread_id).await?;
        let author = match chat.get_member(&author_id) {
            Some(member) => member.clone(),
            None => ChatMember::new(chat.uid.clone(), author_id.clone(), author_id.as_str()),
        };

        // A message delivered as several sub-messages needs a removal for
        // each of them.
        let uids: Vec<MessageId> = match self.tracker.attachment_count(&mid) {
            Some(count) if count > 1 => (0..count).map(|i| mid.with_index(i)).collect(),
            _ => vec![mid],
        };
        for uid in uids {
            let message = Message::text(uid, chat.as_ref().clone(), author.clone(), "");
            self.coordinator
                .send_status(Status::MessageRemoval {
                    source_module: self.channel_id.clone(),
                    message: Box::new(message),
                })
                .await?;
        }
        Ok(())
    }

    async fn on_thread_refresh(&self, thread_id: ThreadId) -> CoreResult<()> {
        debug!(thread = %thread_id, "re-fetching thread on server request");
        self.chats.invalidate(&thread_id);
        self.coordinator
            .send_status(Status::ChatUpdates {
                module_id: self.channel_id.clone(),
                new_chats: vec![thread_id],
                modified_chats: vec![],
                removed_chats: vec![],
            })
            .await
    }
}

/// Builds a message in the common model from an event payload. The
/// quoted message, if any, is built one level deep.
pub(crate) fn message_from_data(
    chat: &Chat,
    mid: &MessageId,
    author_id: &ThreadId,
    data: &MessageData,
) -> Message {
    let mut msg = data_onto_message(chat, mid, author_id, data);
    if let (Some(reply_id), Some(quoted)) = (&data.reply_to_id, data.replied_to.as_deref()) {
        let target = data_onto_message(chat, reply_id, &quoted.author, quoted);
        msg.target = Some(Box::new(target));
    }
    msg
}

fn data_onto_message(
    chat: &Chat,
    mid: &MessageId,
    author_id: &ThreadId,
    data: &MessageData,
) -> Message {
    let author = match chat.get_member(author_id) {
        Some(member) => member.clone(),
        None => {
            warn!(author = %author_id, thread = %chat.uid, "author not in member list");
            ChatMember::new(chat.uid.clone(), author_id.clone(), author_id.as_str())
        }
    };

    let mut msg = Message::text(mid.clone(), chat.clone(), author, data.text.clone());

    if let Some(size) = data.emoji_size {
        msg.text = format!("{} ({})", msg.text, size.letter());
    }

    for mention in &data.mentions {
        if let Some(member) = chat.get_member(&mention.user_id) {
            msg.substitutions.insert(
                mention.offset,
                mention.offset + mention.length,
                member.clone(),
            );
        }
    }

    msg.reactions = build_reactions(chat, data);
    msg
}

/// Resolves per-user reactions against the chat's member list, grouping
/// members by reaction. Reactions from unknown members are dropped.
fn build_reactions(chat: &Chat, data: &MessageData) -> Reactions {
    let mut reactions = Reactions::new();
    for (user, reaction) in &data.reactions {
        if let Some(member) = chat.get_member(user) {
            reactions
                .entry(reaction.clone())
                .or_default()
                .push(member.clone());
        }
    }
    reactions
}
