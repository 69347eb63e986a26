//! Outbound message handling.
//!
//! Messages from the master side are mapped onto Messenger send calls
//! here: text with its emoji shortcuts, media uploads, link unfurling,
//! pinned locations, and the typing indicator.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use courier_core::config::ExperimentalFlags;
use courier_core::types::{
    MediaFile, Message, MessageId, MsgAttribute, MsgType, Substitutions, ThreadId,
};
use courier_core::{CoreError, Result as CoreResult};

use crate::client::{
    EmojiSize, FileUpload, Mention, MessengerClient, OutgoingMessage, SentTracker,
};

/// Prefix of server-assigned message ids. Ids the server echoes in any
/// other shape are not tracked for dedup.
const MESSAGE_ID_PREFIX: &str = "mid.$";

/// Sends messages from the master side out to Messenger.
pub struct OutboundManager {
    client: Arc<dyn MessengerClient>,
    flags: ExperimentalFlags,
    tracker: SentTracker,
    typing_timer: Mutex<Option<JoinHandle<()>>>,
}

impl OutboundManager {
    pub fn new(
        client: Arc<dyn MessengerClient>,
        flags: ExperimentalFlags,
        tracker: SentTracker,
    ) -> Self {
        Self {
            client,
            flags,
            tracker,
            typing_timer: Mutex::new(None),
        }
    }

    /// Sends `msg` out, returning it with its uid replaced by the id the
    /// server assigned.
    pub async fn send_message(&self, mut msg: Message) -> CoreResult<Message> {
        let thread_id = msg.chat.uid.clone();
        let result = self.dispatch(&mut msg, &thread_id).await;

        // Sending from this end implies the account has seen the thread;
        // tell the server so, whether or not the send went through.
        if let Err(error) = self.client.mark_seen().await {
            debug!(%error, "failed to mark inbox seen");
        }
        if let Err(error) = self.client.mark_read(&thread_id).await {
            debug!(%error, "failed to mark thread read");
        }

        result?;
        Ok(msg)
    }

    async fn dispatch(&self, msg: &mut Message, thread_id: &ThreadId) -> CoreResult<()> {
        let mut outgoing = OutgoingMessage {
            text: Some(msg.text.clone()),
            mentions: build_mentions(&msg.substitutions),
            reply_to_id: msg.target.as_ref().map(|target| target.uid.clone()),
            ..OutgoingMessage::default()
        };

        match msg.msg_type {
            MsgType::Text | MsgType::Unsupported => {
                apply_emoji_shortcut(&mut outgoing);
                let mid = self.client.send(outgoing, thread_id).await?;
                self.finish(msg, mid);
            }
            MsgType::Image | MsgType::Sticker | MsgType::Animation => {
                let files = vec![self.upload_from(msg).await?];
                let mid = self
                    .client
                    .send_files(files, outgoing, thread_id, false)
                    .await?;
                self.finish(msg, mid);
            }
            MsgType::Voice => {
                let files = vec![self.upload_from(msg).await?];
                let mid = self
                    .client
                    .send_files(files, outgoing, thread_id, true)
                    .await?;
                self.finish(msg, mid);
            }
            MsgType::File | MsgType::Video => {
                let files = vec![self.upload_from(msg).await?];
                let mid = self
                    .client
                    .send_files(files, outgoing, thread_id, false)
                    .await?;
                self.finish(msg, mid);
            }
            MsgType::Status => {
                let timeout_ms = match &msg.attributes {
                    Some(MsgAttribute::Status { timeout_ms, .. }) => *timeout_ms,
                    _ => {
                        return Err(CoreError::MessageTypeNotSupported(
                            "status message without a status attribute".to_string(),
                        ))
                    }
                };
                self.set_typing_with_timeout(thread_id, timeout_ms).await?;
            }
            MsgType::Link => {
                let (title, description, url) = match &msg.attributes {
                    Some(MsgAttribute::Link {
                        title,
                        description,
                        url,
                        ..
                    }) => (title.clone(), description.clone(), url.clone()),
                    _ => {
                        return Err(CoreError::MessageTypeNotSupported(
                            "link message without a link attribute".to_string(),
                        ))
                    }
                };
                let mut text = if self.flags.send_link_with_description {
                    let parts: Vec<&str> = [title.as_str(), description.as_str(), url.as_str()]
                        .into_iter()
                        .filter(|part| !part.is_empty())
                        .collect();
                    parts.join("\n")
                } else {
                    url
                };
                if !msg.text.is_empty() {
                    text = format!("{}\n{}", msg.text, text);
                }
                outgoing.text = Some(text);
                let mid = self.client.send(outgoing, thread_id).await?;
                self.finish(msg, mid);
            }
            MsgType::Location => {
                let (latitude, longitude) = match &msg.attributes {
                    Some(MsgAttribute::Location {
                        latitude,
                        longitude,
                    }) => (*latitude, *longitude),
                    _ => {
                        return Err(CoreError::MessageTypeNotSupported(
                            "location message without coordinates".to_string(),
                        ))
                    }
                };
                let mid = self
                    .client
                    .send_pinned_location(latitude, longitude, outgoing, thread_id)
                    .await?;
                self.finish(msg, mid);
            }
        }
        Ok(())
    }

    /// Shows the typing indicator, clearing it again once the master's
    /// timeout lapses. A new status resets the running timer.
    async fn set_typing_with_timeout(
        &self,
        thread_id: &ThreadId,
        timeout_ms: u64,
    ) -> CoreResult<()> {
        self.client.set_typing(thread_id, true).await?;

        let client = self.client.clone();
        let thread = thread_id.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(timeout_ms)).await;
            if let Err(error) = client.set_typing(&thread, false).await {
                debug!(%error, "failed to clear typing state");
            }
        });
        if let Some(previous) = self.typing_timer.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Resolves the message's media into an upload, fetching it when it
    /// is only carried by URL.
    async fn upload_from(&self, msg: &Message) -> CoreResult<FileUpload> {
        let data = match &msg.file {
            Some(MediaFile::Bytes(data)) => data.clone(),
            Some(MediaFile::Url(url)) => {
                let (data, _) = self.client.fetch_url(url).await?;
                data
            }
            None => {
                return Err(CoreError::Channel(
                    "media message without a file".to_string(),
                ))
            }
        };
        Ok(FileUpload {
            filename: msg.filename.clone().unwrap_or_else(|| "file".to_string()),
            mime: msg
                .mime
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data,
        })
    }

    fn finish(&self, msg: &mut Message, mid: MessageId) {
        if mid.as_str().starts_with(MESSAGE_ID_PREFIX) {
            self.tracker.record_sent(&mid);
        }
        msg.uid = mid;
    }
}

fn build_mentions(substitutions: &Substitutions) -> Vec<Mention> {
    substitutions
        .iter()
        .map(|(&(start, end), member)| Mention {
            user_id: member.uid.clone(),
            offset: start,
            length: end - start,
        })
        .collect()
}

/// Rewrites text messages Messenger treats specially: a bare thumbs-up
/// goes out as the Like sticker, `👍S`/`M`/`L` as its sized variants,
/// and a sole emoji with a size suffix as oversized emoji text.
fn apply_emoji_shortcut(outgoing: &mut OutgoingMessage) {
    let text = match &outgoing.text {
        Some(text) => text,
        None => return,
    };
    let compare: String = text.chars().filter(|c| *c != '\u{FE0F}').collect();

    if compare == "👍" {
        outgoing.text = None;
        outgoing.sticker_id = Some(EmojiSize::Small.sticker_id().to_string());
        return;
    }

    let last = match compare.chars().last() {
        Some(last) => last,
        None => return,
    };
    let size = match EmojiSize::from_letter(last) {
        Some(size) => size,
        None => return,
    };
    let head = &compare[..compare.len() - last.len_utf8()];
    if head == "👍" {
        outgoing.text = None;
        outgoing.sticker_id = Some(size.sticker_id().to_string());
    } else if is_emoji(head) {
        outgoing.text = Some(head.to_string());
        outgoing.emoji_size = Some(size);
    }
}

/// Whether `text` is non-empty and made up entirely of emoji codepoints
/// (joiners included).
fn is_emoji(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| {
            matches!(
                u32::from(c),
                0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0x200D
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockMessengerClient;
    use crate::error::MessengerError;
    use bytes::Bytes;
    use courier_core::types::{Chat, ChatMember, ChatType, StatusType};

    fn chat() -> Chat {
        let mut chat = Chat::new(ThreadId::new("2001"), "Bob", ChatType::User);
        chat.add_member(ChatMember::new(
            ThreadId::new("2001"),
            ThreadId::new("2001"),
            "Bob",
        ));
        chat
    }

    fn text_message(text: &str) -> Message {
        let chat = chat();
        let author = chat.members[0].clone();
        Message::text(MessageId::new("out.1"), chat, author, text)
    }

    fn manager(mock: MockMessengerClient) -> OutboundManager {
        OutboundManager::new(Arc::new(mock), ExperimentalFlags::default(), SentTracker::new())
    }

    fn expect_marks(mock: &mut MockMessengerClient) {
        mock.expect_mark_seen().times(1).returning(|| Ok(()));
        mock.expect_mark_read().times(1).returning(|_| Ok(()));
    }

    #[tokio::test]
    async fn test_text_send_records_id() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, thread| {
                message.text.as_deref() == Some("hello") && thread.as_str() == "2001"
            })
            .returning(|_, _| Ok(MessageId::new("mid.$new")));

        let manager = manager(mock);
        let sent = manager.send_message(text_message("hello")).await.unwrap();
        assert_eq!(sent.uid.as_str(), "mid.$new");
        assert!(manager.tracker.take_sent(&MessageId::new("mid.$new")));
    }

    #[tokio::test]
    async fn test_thumbs_up_sent_as_sticker() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.text.is_none()
                    && message.sticker_id.as_deref() == Some(EmojiSize::Small.sticker_id())
            })
            .returning(|_, _| Ok(MessageId::new("mid.$like")));

        // Variation selector is ignored when matching the shortcut.
        let manager = manager(mock);
        manager
            .send_message(text_message("👍\u{FE0F}"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sized_thumbs_up() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.sticker_id.as_deref() == Some(EmojiSize::Large.sticker_id())
            })
            .returning(|_, _| Ok(MessageId::new("mid.$like")));

        manager(mock).send_message(text_message("👍L")).await.unwrap();
    }

    #[tokio::test]
    async fn test_sized_emoji_text() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.text.as_deref() == Some("🎉")
                    && message.emoji_size == Some(EmojiSize::Medium)
            })
            .returning(|_, _| Ok(MessageId::new("mid.$emoji")));

        manager(mock).send_message(text_message("🎉M")).await.unwrap();
    }

    #[tokio::test]
    async fn test_plain_text_ending_in_size_letter() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.text.as_deref() == Some("XL") && message.emoji_size.is_none()
            })
            .returning(|_, _| Ok(MessageId::new("mid.$plain")));

        manager(mock).send_message(text_message("XL")).await.unwrap();
    }

    #[tokio::test]
    async fn test_mentions_and_reply_forwarded() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.reply_to_id.as_ref().map(|id| id.as_str()) == Some("mid.$target")
                    && message.mentions.len() == 1
                    && message.mentions[0].offset == 3
                    && message.mentions[0].length == 4
            })
            .returning(|_, _| Ok(MessageId::new("mid.$reply")));

        let mut msg = text_message("hi @Bob");
        let member = msg.chat.members[0].clone();
        msg.substitutions.insert(3, 7, member);
        msg.target = Some(Box::new(Message {
            uid: MessageId::new("mid.$target"),
            ..Message::default()
        }));
        manager(mock).send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_voice_uploads_as_clip() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send_files()
            .withf(|files, _, _, voice_clip| {
                *voice_clip && files.len() == 1 && files[0].filename == "note.mp3"
            })
            .returning(|_, _, _, _| Ok(MessageId::new("mid.$voice")));

        let mut msg = text_message("");
        msg.msg_type = MsgType::Voice;
        msg.filename = Some("note.mp3".to_string());
        msg.mime = Some("audio/mpeg".to_string());
        msg.file = Some(MediaFile::Bytes(Bytes::from_static(b"audio")));
        manager(mock).send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_image_fetched_from_url() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_fetch_url()
            .times(1)
            .returning(|_| Ok((Bytes::from_static(b"img"), None)));
        mock.expect_send_files()
            .withf(|files, _, _, voice_clip| {
                !*voice_clip && files[0].data == Bytes::from_static(b"img")
            })
            .returning(|_, _, _, _| Ok(MessageId::new("mid.$img")));

        let mut msg = text_message("");
        msg.msg_type = MsgType::Image;
        msg.file = Some(MediaFile::Url("https://example.com/i.png".to_string()));
        manager(mock).send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_media_without_file_rejected() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);

        let mut msg = text_message("");
        msg.msg_type = MsgType::File;
        let err = manager(mock).send_message(msg).await.unwrap_err();
        assert!(matches!(err, CoreError::Channel(_)));
    }

    #[tokio::test]
    async fn test_link_sends_bare_url_by_default() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| message.text.as_deref() == Some("https://example.com/a"))
            .returning(|_, _| Ok(MessageId::new("mid.$link")));

        let mut msg = text_message("");
        msg.msg_type = MsgType::Link;
        msg.attributes = Some(MsgAttribute::Link {
            title: "A headline".to_string(),
            description: "Details".to_string(),
            image: None,
            url: "https://example.com/a".to_string(),
        });
        manager(mock).send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_link_with_description_flag() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .withf(|message, _| {
                message.text.as_deref()
                    == Some("see this\nA headline\nDetails\nhttps://example.com/a")
            })
            .returning(|_, _| Ok(MessageId::new("mid.$link")));

        let flags = ExperimentalFlags {
            send_link_with_description: true,
            ..ExperimentalFlags::default()
        };
        let manager = OutboundManager::new(Arc::new(mock), flags, SentTracker::new());

        let mut msg = text_message("see this");
        msg.msg_type = MsgType::Link;
        msg.attributes = Some(MsgAttribute::Link {
            title: "A headline".to_string(),
            description: "Details".to_string(),
            image: None,
            url: "https://example.com/a".to_string(),
        });
        manager.send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_location_pinned() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send_pinned_location()
            .withf(|latitude, longitude, _, _| {
                (*latitude - 51.5).abs() < 1e-9 && (*longitude + 0.12).abs() < 1e-9
            })
            .returning(|_, _, _, _| Ok(MessageId::new("mid.$loc")));

        let mut msg = text_message("");
        msg.msg_type = MsgType::Location;
        msg.attributes = Some(MsgAttribute::Location {
            latitude: 51.5,
            longitude: -0.12,
        });
        manager(mock).send_message(msg).await.unwrap();
    }

    #[tokio::test]
    async fn test_typing_cleared_after_timeout() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_set_typing()
            .withf(|_, typing| *typing)
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_set_typing()
            .withf(|_, typing| !*typing)
            .times(1)
            .returning(|_, _| Ok(()));

        let mut msg = text_message("");
        msg.msg_type = MsgType::Status;
        msg.attributes = Some(MsgAttribute::Status {
            status_type: StatusType::Typing,
            timeout_ms: 20,
        });
        let manager = manager(mock);
        manager.send_message(msg).await.unwrap();
        sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn test_marks_applied_even_when_send_fails() {
        let mut mock = MockMessengerClient::new();
        expect_marks(&mut mock);
        mock.expect_send()
            .returning(|_, _| Err(MessengerError::api("temporary failure")));

        let err = manager(mock)
            .send_message(text_message("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Channel(_)));
    }

    #[test]
    fn test_is_emoji() {
        assert!(is_emoji("🎉"));
        assert!(is_emoji("👨‍👩‍👧"));
        assert!(is_emoji("☀"));
        assert!(!is_emoji("hi"));
        assert!(!is_emoji(""));
        assert!(!is_emoji("🎉!"));
    }
}
