//! Chat construction and caching.
//!
//! Threads come off the wire as GraphQL dicts in one of two shapes: a
//! full thread (`thread_key` present) or a messaging actor. Both get
//! mapped onto [`Chat`]s here and cached for the lifetime of the
//! channel; there is no eviction.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

use courier_core::config::ExperimentalFlags;
use courier_core::types::{Chat, ChatMember, ChatType, ThreadId};

use crate::client::{MessengerClient, ThreadLocation};
use crate::error::{MessengerError, Result};
use crate::graphql::{get_str, get_string, get_value};

/// Threads fetched per page when listing; the API caps a single request
/// at this many.
const THREAD_PAGE_SIZE: usize = 20;

/// Builds chats from GraphQL dicts and keeps them cached by thread id.
pub struct ChatManager {
    client: Arc<dyn MessengerClient>,
    flags: ExperimentalFlags,
    cache: DashMap<ThreadId, Arc<Chat>>,
}

impl ChatManager {
    pub fn new(client: Arc<dyn MessengerClient>, flags: ExperimentalFlags) -> Self {
        Self {
            client,
            flags,
            cache: DashMap::new(),
        }
    }

    /// The chat for a thread, from cache or built from a fresh thread
    /// info fetch.
    pub async fn get_thread(&self, thread_id: &ThreadId) -> Result<Arc<Chat>> {
        if let Some(entry) = self.cache.get(thread_id) {
            return Ok(entry.clone());
        }
        debug!(thread = %thread_id, "thread not cached, fetching info");
        let info = self.client.fetch_thread_info(thread_id).await?;
        let chat = self.build_graphql(&info).await?;
        Ok(self.cache_chat(chat))
    }

    /// Drops a cached chat so the next lookup rebuilds it.
    pub fn invalidate(&self, thread_id: &ThreadId) {
        self.cache.remove(thread_id);
    }

    /// Every chat the account can see: paged thread listing over the
    /// configured locations, then any user the account has talked to
    /// that the listing missed.
    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        let mut locations = vec![ThreadLocation::Inbox];
        if self.flags.show_pending_threads {
            locations.push(ThreadLocation::Pending);
            locations.push(ThreadLocation::Other);
        }
        if self.flags.show_archived_threads {
            locations.push(ThreadLocation::Archived);
        }

        let mut chats: Vec<Chat> = Vec::new();
        let mut seen: HashSet<ThreadId> = HashSet::new();
        let mut before: Option<i64> = None;
        loop {
            let nodes = self
                .client
                .fetch_thread_list(THREAD_PAGE_SIZE, before, &locations)
                .await?;
            let batch_len = nodes.len();
            let mut added = 0;
            for node in &nodes {
                match get_str(node, &["thread_type"]) {
                    Some("ONE_TO_ONE") | Some("GROUP") => match self.build_thread(node) {
                        Ok(chat) => {
                            if seen.insert(chat.uid.clone()) {
                                let chat = self.cache_chat(chat);
                                chats.push(chat.as_ref().clone());
                                added += 1;
                            }
                        }
                        Err(error) => error!(%error, "failed to build thread from listing"),
                    },
                    Some("MARKETPLACE") => {
                        warn!("Marketplace chat is yet to be supported");
                    }
                    other => {
                        error!(thread_type = other.unwrap_or("<none>"), "unknown thread type");
                    }
                }
            }
            if batch_len < THREAD_PAGE_SIZE || added == 0 {
                break;
            }
            // Nodes are newest first; the last one carries the cursor
            // for the next page.
            before = nodes.last().and_then(last_message_timestamp);
            if before.is_none() {
                break;
            }
        }

        for node in self.client.fetch_users().await? {
            match self.build_actor_data(&node) {
                Ok(chat) => {
                    if seen.insert(chat.uid.clone()) {
                        let chat = self.cache_chat(chat);
                        chats.push(chat.as_ref().clone());
                    }
                }
                Err(error) => error!(%error, "failed to build user from listing"),
            }
        }

        Ok(chats)
    }

    fn cache_chat(&self, chat: Chat) -> Arc<Chat> {
        let chat = Arc::new(chat);
        self.cache.insert(chat.uid.clone(), chat.clone());
        chat
    }

    /// Builds a chat from either GraphQL shape.
    async fn build_graphql(&self, node: &Value) -> Result<Chat> {
        if node.get("thread_key").is_some() {
            self.build_thread(node)
        } else {
            self.build_actor(node, true).await
        }
    }

    /// Builds a chat from a full thread dict.
    fn build_thread(&self, node: &Value) -> Result<Chat> {
        let own_id = self.client.own_id();
        let thread_name = get_str(node, &["name"]).filter(|n| !n.is_empty());
        let customizations = participant_customizations(node);

        match get_str(node, &["thread_type"]) {
            Some("ONE_TO_ONE") => {
                let other_id = get_str(node, &["thread_key", "other_user_id"]).ok_or_else(|| {
                    MessengerError::graphql("one-to-one thread without other_user_id")
                })?;
                let uid = ThreadId::new(other_id);

                let actor = get_value(node, &["all_participants", "nodes"])
                    .and_then(Value::as_array)
                    .and_then(|nodes| {
                        nodes.iter().find(|participant| {
                            get_str(participant, &["messaging_actor", "id"]) == Some(other_id)
                        })
                    })
                    .and_then(|participant| get_value(participant, &["messaging_actor"]));
                let actor_name = actor.and_then(|a| get_string(a, &["name"]));

                let name = thread_name
                    .map(str::to_string)
                    .or_else(|| actor_name.clone())
                    .unwrap_or_default();
                let mut chat = Chat::new(uid.clone(), name, ChatType::User);
                if let Some(actor) = actor {
                    if let Some(typename) = get_str(actor, &["__typename"]) {
                        chat.set_vendor("chat_type", typename);
                    }
                    if let Some(uri) = get_str(actor, &["big_image_src", "uri"]) {
                        chat.set_vendor("profile_picture_url", uri);
                    }
                }

                let mut own_nickname = None;
                let mut other_nickname = None;
                for (participant, nickname) in &customizations {
                    if participant.as_str() == other_id {
                        other_nickname = Some(nickname.clone());
                    } else {
                        own_nickname = Some(nickname.clone());
                    }
                }
                chat.alias = own_nickname.clone().or_else(|| other_nickname.clone());

                let member_name = actor_name.unwrap_or_else(|| chat.name.clone());
                let mut other = ChatMember::new(uid.clone(), uid.clone(), member_name);
                other.alias = other_nickname;
                other.is_self = uid == own_id;
                chat.add_member(other);
                if uid != own_id {
                    let mut own = ChatMember::self_member(uid, own_id, "You");
                    own.alias = own_nickname;
                    chat.add_member(own);
                } else if chat.name.is_empty() {
                    chat.name = "You".to_string();
                }
                Ok(chat)
            }
            Some("GROUP") => {
                let fbid = get_str(node, &["thread_key", "thread_fbid"]).ok_or_else(|| {
                    MessengerError::graphql("group thread without thread_fbid")
                })?;
                let uid = ThreadId::new(fbid);
                let mut chat = Chat::new(
                    uid.clone(),
                    thread_name.unwrap_or_default(),
                    ChatType::Group,
                );
                chat.set_vendor("chat_type", "Group");
                if let Some(uri) = get_str(node, &["image", "uri"]) {
                    chat.set_vendor("profile_picture_url", uri);
                }

                let participants = get_value(node, &["all_participants", "nodes"])
                    .and_then(Value::as_array);
                if let Some(participants) = participants {
                    for participant in participants {
                        let actor = match get_value(participant, &["messaging_actor"]) {
                            Some(actor) => actor,
                            None => continue,
                        };
                        let id = match get_str(actor, &["id"]) {
                            Some(id) => id,
                            None => continue,
                        };
                        let mut member = ChatMember::new(
                            uid.clone(),
                            ThreadId::new(id),
                            get_string(actor, &["name"]).unwrap_or_default(),
                        );
                        member.is_self = member.uid == own_id;
                        let nickname = customizations
                            .iter()
                            .find(|(participant_id, _)| participant_id.as_str() == id);
                        if let Some((_, nickname)) = nickname {
                            member.alias = Some(nickname.clone());
                        }
                        chat.add_member(member);
                    }
                }
                if chat.name.is_empty() {
                    chat.name = synthesize_group_name(&chat.members, &chat.uid);
                }
                Ok(chat)
            }
            other => Err(MessengerError::graphql(format!(
                "unsupported thread type: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Builds a user chat from an actor dict, re-fetching the thread once
    /// when the actor comes without a name.
    async fn build_actor(&self, node: &Value, recurse: bool) -> Result<Chat> {
        let actor = node.get("messaging_actor").unwrap_or(node);
        if get_str(actor, &["name"]).is_none() && recurse {
            if let Some(id) = get_str(actor, &["id"]) {
                debug!(actor = id, "actor info incomplete, re-fetching thread");
                let thread_id = ThreadId::new(id);
                let info = self.client.fetch_thread_info(&thread_id).await?;
                if info.get("thread_key").is_some() {
                    return self.build_thread(&info);
                }
                return self.build_actor_data(&info);
            }
        }
        self.build_actor_data(node)
    }

    fn build_actor_data(&self, node: &Value) -> Result<Chat> {
        let actor = node.get("messaging_actor").unwrap_or(node);
        let id = get_str(actor, &["id"])
            .ok_or_else(|| MessengerError::graphql("actor node without id"))?;
        let uid = ThreadId::new(id);
        let own_id = self.client.own_id();
        let name = get_string(actor, &["name"]).unwrap_or_default();

        let mut chat = Chat::new(uid.clone(), name.clone(), ChatType::User);
        if let Some(typename) = get_str(actor, &["__typename"]) {
            chat.set_vendor("chat_type", typename);
        }
        if let Some(uri) = get_str(actor, &["big_image_src", "uri"]) {
            chat.set_vendor("profile_picture_url", uri);
        }

        let mut member = ChatMember::new(uid.clone(), uid.clone(), name);
        member.is_self = uid == own_id;
        chat.add_member(member);
        if uid != own_id {
            chat.add_member(ChatMember::self_member(uid, own_id, "You"));
        }
        Ok(chat)
    }
}

/// Per-thread nicknames from `customization_info`, as
/// `(participant id, nickname)` pairs.
fn participant_customizations(node: &Value) -> Vec<(String, String)> {
    let mut customizations = Vec::new();
    let entries = get_value(node, &["customization_info", "participant_customizations"])
        .and_then(Value::as_array);
    if let Some(entries) = entries {
        for entry in entries {
            let id = get_str(entry, &["participant_id"]);
            let nickname = get_str(entry, &["nickname"]).filter(|n| !n.is_empty());
            if let (Some(id), Some(nickname)) = (id, nickname) {
                customizations.push((id.to_string(), nickname.to_string()));
            }
        }
    }
    customizations
}

/// Group name synthesized from member names when the thread is unnamed:
/// the first three names sorted, then a count of the rest.
fn synthesize_group_name(members: &[ChatMember], uid: &ThreadId) -> String {
    let mut names: Vec<&str> = members
        .iter()
        .map(|member| member.display_name())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return format!("Group {uid}");
    }
    names.sort_unstable();
    let mut name = names[..names.len().min(3)].join(", ");
    if names.len() > 3 {
        name.push_str(&format!(", and {} more", names.len() - 3));
    }
    name
}

/// Timestamp of a thread's newest message, used as the paging cursor.
fn last_message_timestamp(node: &Value) -> Option<i64> {
    let value = get_value(node, &["last_message", "nodes", "0", "timestamp_precise"])?;
    match value {
        Value::String(raw) => raw.parse().ok(),
        other => other.as_i64(),
    }
}
