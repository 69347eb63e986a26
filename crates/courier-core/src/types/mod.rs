//! Common chat model shared by every channel.

mod chat;
mod identifiers;
mod message;
mod status;

pub use chat::{Chat, ChatMember, ChatType, SYSTEM_MEMBER_ID};
pub use identifiers::{MessageId, ModuleId, ThreadId};
pub use message::{
    MediaFile, Message, MsgAttribute, MsgType, Reactions, StatusType, Substitutions,
    SUGGESTED_REACTIONS,
};
pub use status::Status;
