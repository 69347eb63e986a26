//! Facebook Messenger slave channel for Courier.
//!
//! Bridges one Messenger account into the courier chat relay. Inbound
//! events from the transport become framework messages and statuses;
//! master messages are translated back into client sends; a set of extra
//! functions covers thread management from the master side.

pub mod error;
pub mod graphql;
pub mod session;
pub mod http;
pub mod client;
pub mod attachments;
pub mod chats;
pub mod listener;
pub mod outbound;
pub mod extras;
pub mod channel;

pub use error::{MessengerError, Result};
pub use session::{Session, SessionCookie};
pub use http::GraphqlSession;
pub use client::{
    EmojiSize, FileUpload, ListenerEvent, Mention, MessageData, MessengerClient, OutgoingMessage,
    SentTracker, ThreadLocation,
};
pub use attachments::AttachmentClassifier;
pub use chats::ChatManager;
pub use listener::Listener;
pub use outbound::OutboundManager;
pub use extras::ExtraFunctions;
pub use channel::{MessengerChannel, CHANNEL_ID};
