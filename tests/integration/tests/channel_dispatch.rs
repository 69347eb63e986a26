//! End-to-end dispatch through the channel facade.
//!
//! A stub client stands in for the wire. Events flow in through the
//! listener stream and out through a coordinator receiver, the way a
//! master module would see them; master traffic goes the other way
//! through the `SlaveChannel` surface.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

use courier_core::channel::{Coordinator, CoordinatorReceiver, SlaveChannel};
use courier_core::config::ExperimentalFlags;
use courier_core::types::{
    Chat, ChatMember, ChatType, Message, MessageId, ModuleId, MsgType, Status, ThreadId,
};
use courier_integration_tests::StubClient;
use courier_messenger::{ListenerEvent, MessageData, MessengerChannel};

fn one_to_one_thread() -> Value {
    json!({
        "thread_key": {"other_user_id": "2001"},
        "thread_type": "ONE_TO_ONE",
        "all_participants": {
            "nodes": [
                {"messaging_actor": {"id": "1000", "name": "Me", "__typename": "User"}},
                {"messaging_actor": {"id": "2001", "name": "Bob", "__typename": "User"}},
            ],
        },
    })
}

fn file_attachment(name: &str) -> Value {
    json!({
        "filename": name,
        "mimeType": "application/pdf",
        "mercury": {
            "blob_attachment": {
                "__typename": "MessageFile",
                "url": format!("https://cdn.fbsbx.com/{name}"),
            },
        },
    })
}

fn channel_with(
    stub: Arc<StubClient>,
) -> (
    MessengerChannel,
    CoordinatorReceiver,
    mpsc::Sender<ListenerEvent>,
) {
    let (coordinator, receiver) = Coordinator::channel(16);
    let (events_tx, events) = mpsc::channel(16);
    let channel =
        MessengerChannel::new(stub, coordinator, events, ExperimentalFlags::default(), "");
    (channel, receiver, events_tx)
}

async fn next_message(receiver: &mut CoordinatorReceiver) -> Message {
    timeout(Duration::from_secs(5), receiver.messages.recv())
        .await
        .expect("no message within 5s")
        .expect("message channel closed")
}

async fn next_status(receiver: &mut CoordinatorReceiver) -> Status {
    timeout(Duration::from_secs(5), receiver.statuses.recv())
        .await
        .expect("no status within 5s")
        .expect("status channel closed")
}

fn message_event(mid: &str, text: &str, attachments: Vec<Value>) -> ListenerEvent {
    ListenerEvent::Message {
        mid: MessageId::new(mid),
        author_id: ThreadId::new("2001"),
        thread_id: ThreadId::new("2001"),
        message: MessageData {
            author: ThreadId::new("2001"),
            text: text.to_string(),
            attachments,
            ..MessageData::default()
        },
    }
}

#[tokio::test]
async fn test_inbound_message_splits_per_attachment() {
    let mut stub = StubClient::new("1000");
    stub.thread_info = one_to_one_thread();
    let stub = Arc::new(stub);
    let (channel, mut receiver, events_tx) = channel_with(stub.clone());

    channel.poll().await.unwrap();
    events_tx
        .send(message_event(
            "mid.$m",
            "two files",
            vec![file_attachment("a.pdf"), file_attachment("b.pdf")],
        ))
        .await
        .unwrap();

    let first = next_message(&mut receiver).await;
    let second = next_message(&mut receiver).await;
    assert_eq!(first.uid.as_str(), "mid.$m.0");
    assert_eq!(second.uid.as_str(), "mid.$m.1");
    assert_eq!(first.msg_type, MsgType::File);
    assert_eq!(first.filename.as_deref(), Some("a.pdf"));
    assert_eq!(second.filename.as_deref(), Some("b.pdf"));
    assert_eq!(first.chat.uid.as_str(), "2001");
    assert_eq!(first.author.name, "Bob");

    // Events are handled in order, so once the refresh status arrives the
    // delivery receipt for the message event has been sent.
    events_tx
        .send(ListenerEvent::ThreadRefresh {
            thread_id: ThreadId::new("2001"),
        })
        .await
        .unwrap();
    let status = next_status(&mut receiver).await;
    assert!(matches!(status, Status::ChatUpdates { .. }));
    assert_eq!(stub.delivered.lock().len(), 1);
    assert_eq!(stub.delivered.lock()[0].as_str(), "mid.$m");

    channel.stop_polling().await.unwrap();
}

#[tokio::test]
async fn test_unsend_fans_out_per_sub_message() {
    let mut stub = StubClient::new("1000");
    stub.thread_info = one_to_one_thread();
    let stub = Arc::new(stub);
    let (channel, mut receiver, events_tx) = channel_with(stub);

    channel.poll().await.unwrap();
    events_tx
        .send(message_event(
            "mid.$m",
            "two files",
            vec![file_attachment("a.pdf"), file_attachment("b.pdf")],
        ))
        .await
        .unwrap();
    next_message(&mut receiver).await;
    next_message(&mut receiver).await;

    events_tx
        .send(ListenerEvent::MessageUnsent {
            mid: MessageId::new("mid.$m"),
            author_id: ThreadId::new("2001"),
            thread_id: ThreadId::new("2001"),
        })
        .await
        .unwrap();

    let mut removed = Vec::new();
    for _ in 0..2 {
        match next_status(&mut receiver).await {
            Status::MessageRemoval { message, .. } => removed.push(message.uid),
            other => panic!("unexpected status: {other:?}"),
        }
    }
    assert_eq!(removed[0].as_str(), "mid.$m.0");
    assert_eq!(removed[1].as_str(), "mid.$m.1");

    channel.stop_polling().await.unwrap();
}

#[tokio::test]
async fn test_send_message_assigns_network_id() {
    let mut stub = StubClient::new("1000");
    stub.thread_info = one_to_one_thread();
    stub.assigned_mid = MessageId::new("mid.$new");
    let stub = Arc::new(stub);
    let (channel, _receiver, _events_tx) = channel_with(stub.clone());

    let chat = Chat::new(ThreadId::new("2001"), "Bob", ChatType::User);
    let author = ChatMember::self_member(ThreadId::new("2001"), ThreadId::new("1000"), "You");
    let msg = Message::text(MessageId::new("local.1"), chat, author, "hello");

    let sent = channel.send_message(msg).await.unwrap();
    assert_eq!(sent.uid.as_str(), "mid.$new");
    assert_eq!(sent.text, "hello");

    assert_eq!(stub.sent.lock().len(), 1);
    assert_eq!(stub.sent.lock()[0].text.as_deref(), Some("hello"));
    // A completed send marks the inbox seen and the thread read.
    assert_eq!(*stub.seen_count.lock(), 1);
    assert_eq!(stub.read_threads.lock().len(), 1);
    assert_eq!(stub.read_threads.lock()[0].as_str(), "2001");
}

#[tokio::test]
async fn test_send_status_reaches_client() {
    let mut stub = StubClient::new("1000");
    stub.thread_info = one_to_one_thread();
    let stub = Arc::new(stub);
    let (channel, _receiver, _events_tx) = channel_with(stub.clone());

    channel
        .send_status(Status::MessageRemoval {
            source_module: ModuleId::new("courier.master"),
            message: Box::new(Message {
                uid: MessageId::new("mid.$old.1"),
                ..Message::default()
            }),
        })
        .await
        .unwrap();
    // The sub-message suffix is stripped before the unsend.
    assert_eq!(stub.unsent.lock().len(), 1);
    assert_eq!(stub.unsent.lock()[0].as_str(), "mid.$old");

    channel
        .send_status(Status::ReactToMessage {
            chat_uid: ThreadId::new("2001"),
            msg_id: MessageId::new("mid.$old"),
            reaction: Some("😆".to_string()),
        })
        .await
        .unwrap();
    let reacted = stub.reacted.lock();
    assert_eq!(reacted.len(), 1);
    assert_eq!(reacted[0].0.as_str(), "mid.$old");
    assert_eq!(reacted[0].1.as_deref(), Some("😆"));
}

#[tokio::test]
async fn test_get_chat_via_facade() {
    let mut stub = StubClient::new("1000");
    stub.thread_info = one_to_one_thread();
    let stub = Arc::new(stub);
    let (channel, _receiver, _events_tx) = channel_with(stub);

    let chat = channel.get_chat(&ThreadId::new("2001")).await.unwrap();
    assert_eq!(chat.name, "Bob");
    assert_eq!(chat.chat_type, ChatType::User);
    assert!(chat.get_member(&ThreadId::new("1000")).unwrap().is_self);
    assert!(!chat.get_member(&ThreadId::new("2001")).unwrap().is_self);
}

#[tokio::test]
async fn test_extras_through_facade() {
    let mut stub = StubClient::new("1000");
    stub.search_results = vec![json!({"id": "2001", "name": "Alice", "__typename": "User"})];
    let stub = Arc::new(stub);
    let (channel, _receiver, _events_tx) = channel_with(stub);

    assert_eq!(channel.extra_functions().len(), 11);

    let reply = channel.call_extra("search_users", "alice").await.unwrap();
    assert_eq!(reply, "Found 1 user.\n\n2001: Alice");

    assert!(channel.call_extra("bogus", "").await.is_err());
}
