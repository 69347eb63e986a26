//! Test doubles shared by the integration tests.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;

use courier_core::types::{MessageId, ThreadId};
use courier_messenger::{FileUpload, MessengerClient, OutgoingMessage, Result, ThreadLocation};

/// Canned [`MessengerClient`] backed by fixed responses.
///
/// Unlike a mock it sets up no expectations; every call succeeds with the
/// configured data and is recorded, and tests inspect the records
/// afterwards.
pub struct StubClient {
    own_id: ThreadId,
    /// Returned from every `fetch_thread_info` call.
    pub thread_info: Value,
    /// Returned from every `fetch_message` call.
    pub message_node: Value,
    /// Returned from every `fetch_thread_list` page.
    pub thread_list: Vec<Value>,
    /// Returned from every search call.
    pub search_results: Vec<Value>,
    /// Message id assigned to every send.
    pub assigned_mid: MessageId,
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub sent_files: Mutex<Vec<Vec<FileUpload>>>,
    pub unsent: Mutex<Vec<MessageId>>,
    pub reacted: Mutex<Vec<(MessageId, Option<String>)>>,
    pub delivered: Mutex<Vec<MessageId>>,
    pub read_threads: Mutex<Vec<ThreadId>>,
    pub seen_count: Mutex<usize>,
}

impl StubClient {
    pub fn new(own_id: &str) -> Self {
        Self {
            own_id: ThreadId::new(own_id),
            thread_info: Value::Null,
            message_node: Value::Null,
            thread_list: Vec::new(),
            search_results: Vec::new(),
            assigned_mid: MessageId::new("mid.$stub"),
            sent: Mutex::new(Vec::new()),
            sent_files: Mutex::new(Vec::new()),
            unsent: Mutex::new(Vec::new()),
            reacted: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            read_threads: Mutex::new(Vec::new()),
            seen_count: Mutex::new(0),
        }
    }
}

#[async_trait]
impl MessengerClient for StubClient {
    fn own_id(&self) -> ThreadId {
        self.own_id.clone()
    }

    async fn fetch_thread_list(
        &self,
        _limit: usize,
        _before: Option<i64>,
        _locations: &[ThreadLocation],
    ) -> Result<Vec<Value>> {
        Ok(self.thread_list.clone())
    }

    async fn fetch_thread_info(&self, _thread_id: &ThreadId) -> Result<Value> {
        Ok(self.thread_info.clone())
    }

    async fn fetch_message(&self, _thread_id: &ThreadId, _mid: &MessageId) -> Result<Value> {
        Ok(self.message_node.clone())
    }

    async fn fetch_image_url(&self, attachment_id: &str) -> Result<String> {
        Ok(format!("https://scontent.example.com/{attachment_id}.jpg"))
    }

    async fn fetch_users(&self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn fetch_url(&self, _url: &str) -> Result<(Bytes, Option<String>)> {
        Ok((Bytes::from_static(b"stub-bytes"), Some("image/png".to_string())))
    }

    async fn send(&self, message: OutgoingMessage, _thread_id: &ThreadId) -> Result<MessageId> {
        self.sent.lock().push(message);
        Ok(self.assigned_mid.clone())
    }

    async fn send_files(
        &self,
        files: Vec<FileUpload>,
        message: OutgoingMessage,
        _thread_id: &ThreadId,
        _voice_clip: bool,
    ) -> Result<MessageId> {
        self.sent_files.lock().push(files);
        self.sent.lock().push(message);
        Ok(self.assigned_mid.clone())
    }

    async fn send_pinned_location(
        &self,
        _latitude: f64,
        _longitude: f64,
        message: OutgoingMessage,
        _thread_id: &ThreadId,
    ) -> Result<MessageId> {
        self.sent.lock().push(message);
        Ok(self.assigned_mid.clone())
    }

    async fn react(&self, mid: &MessageId, reaction: Option<String>) -> Result<()> {
        self.reacted.lock().push((mid.clone(), reaction));
        Ok(())
    }

    async fn unsend(&self, mid: &MessageId) -> Result<()> {
        self.unsent.lock().push(mid.clone());
        Ok(())
    }

    async fn set_typing(&self, _thread_id: &ThreadId, _typing: bool) -> Result<()> {
        Ok(())
    }

    async fn mark_delivered(&self, _thread_id: &ThreadId, mid: &MessageId) -> Result<()> {
        self.delivered.lock().push(mid.clone());
        Ok(())
    }

    async fn mark_read(&self, thread_id: &ThreadId) -> Result<()> {
        self.read_threads.lock().push(thread_id.clone());
        Ok(())
    }

    async fn mark_seen(&self) -> Result<()> {
        *self.seen_count.lock() += 1;
        Ok(())
    }

    async fn search_users(&self, _query: &str, _limit: usize) -> Result<Vec<Value>> {
        Ok(self.search_results.clone())
    }

    async fn search_groups(&self, _query: &str, _limit: usize) -> Result<Vec<Value>> {
        Ok(self.search_results.clone())
    }

    async fn search_pages(&self, _query: &str, _limit: usize) -> Result<Vec<Value>> {
        Ok(self.search_results.clone())
    }

    async fn search_threads(&self, _query: &str, _limit: usize) -> Result<Vec<Value>> {
        Ok(self.search_results.clone())
    }

    async fn add_group_members(
        &self,
        _thread_id: &ThreadId,
        _user_ids: &[ThreadId],
    ) -> Result<()> {
        Ok(())
    }

    async fn remove_group_member(
        &self,
        _thread_id: &ThreadId,
        _user_id: &ThreadId,
    ) -> Result<()> {
        Ok(())
    }

    async fn set_nickname(
        &self,
        _thread_id: &ThreadId,
        _user_id: &ThreadId,
        _nickname: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn set_group_title(&self, _thread_id: &ThreadId, _title: &str) -> Result<()> {
        Ok(())
    }

    async fn set_chat_emoji(&self, _thread_id: &ThreadId, _emoji: &str) -> Result<()> {
        Ok(())
    }
}
