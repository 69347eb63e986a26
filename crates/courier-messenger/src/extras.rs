//! Operator commands exposed beyond plain messaging.
//!
//! Each command takes a raw argument string and answers with a text
//! report. Failures inside a command are reported as text too, so the
//! operator sees what went wrong instead of a dropped command.

use serde_json::Value;
use std::sync::Arc;

use courier_core::channel::ExtraFunction;
use courier_core::types::ThreadId;
use courier_core::{CoreError, Result as CoreResult};

use crate::chats::ChatManager;
use crate::client::MessengerClient;
use crate::error::Result;
use crate::graphql::get_str;

/// Search commands show at most this many results.
const SEARCH_LIMIT: usize = 10;

/// Commands the channel registers with the master. `{function_name}` in
/// the descriptions is substituted by the master side.
pub const EXTRA_FUNCTIONS: &[ExtraFunction] = &[
    ExtraFunction {
        name: "threads_list",
        display_name: "Show threads list",
        description: "Usage:\n    {function_name}",
    },
    ExtraFunction {
        name: "search_users",
        display_name: "Search for users",
        description: "Show the first 10 results.\nUsage:\n    {function_name} keyword",
    },
    ExtraFunction {
        name: "search_groups",
        display_name: "Search for groups",
        description: "Show the first 10 results.\nUsage:\n    {function_name} keyword",
    },
    ExtraFunction {
        name: "search_pages",
        display_name: "Search for pages",
        description: "Show the first 10 results.\nUsage:\n    {function_name} keyword",
    },
    ExtraFunction {
        name: "search_threads",
        display_name: "Search for threads",
        description: "Show the first 10 results.\nUsage:\n    {function_name} keyword",
    },
    ExtraFunction {
        name: "add_to_group",
        display_name: "Add to group",
        description: "Add members to a group.\nUsage:\n    {function_name} GroupID UserID [UserID ...]",
    },
    ExtraFunction {
        name: "remove_from_group",
        display_name: "Remove from group",
        description: "Remove a member from a group.\nUsage:\n    {function_name} GroupID UserID",
    },
    ExtraFunction {
        name: "set_nickname",
        display_name: "Change nickname",
        description: "Change nickname of a user.\nUsage:\n    {function_name} UserID nickname",
    },
    ExtraFunction {
        name: "set_group_title",
        display_name: "Change group title",
        description: "Change the title of a group.\nUsage:\n    {function_name} GroupID title",
    },
    ExtraFunction {
        name: "set_chat_emoji",
        display_name: "Change chat emoji",
        description: "Change the emoji of a chat.\nUsage:\n    {function_name} ChatID emoji",
    },
    ExtraFunction {
        name: "set_member_nickname",
        display_name: "Change member nickname",
        description: "Change the nickname of a group member.\nUsage:\n    {function_name} GroupID MemberID nickname",
    },
];

/// Dispatches operator commands against the client.
pub struct ExtraFunctions {
    client: Arc<dyn MessengerClient>,
    chats: Arc<ChatManager>,
}

impl ExtraFunctions {
    pub fn new(client: Arc<dyn MessengerClient>, chats: Arc<ChatManager>) -> Self {
        Self { client, chats }
    }

    pub fn descriptors() -> &'static [ExtraFunction] {
        EXTRA_FUNCTIONS
    }

    /// Runs the command `name` with `args`. An unknown name is an error;
    /// a command that fails reports the failure in its reply text.
    pub async fn call(&self, name: &str, args: &str) -> CoreResult<String> {
        let result = match name {
            "threads_list" => self.threads_list(args).await,
            "search_users" => self.search_users(args).await,
            "search_groups" => self.search_groups(args).await,
            "search_pages" => self.search_pages(args).await,
            "search_threads" => self.search_threads(args).await,
            "add_to_group" => self.add_to_group(args).await,
            "remove_from_group" => self.remove_from_group(args).await,
            "set_nickname" => self.set_nickname(args).await,
            "set_group_title" => self.set_group_title(args).await,
            "set_chat_emoji" => self.set_chat_emoji(args).await,
            "set_member_nickname" => self.set_member_nickname(args).await,
            _ => {
                return Err(CoreError::OperationNotSupported(format!(
                    "unknown extra function {name}"
                )))
            }
        };
        Ok(match result {
            Ok(reply) => reply,
            Err(error) => format!("Error occurred in {name}({args}): {error}"),
        })
    }

    async fn threads_list(&self, _args: &str) -> Result<String> {
        let chats = self.chats.list_chats().await?;
        let mut out = if chats.len() == 1 {
            format!("You have {} thread in your thread list.\n", chats.len())
        } else {
            format!("You have {} threads in your thread list.\n", chats.len())
        };
        for chat in &chats {
            let chat_type = chat.vendor_str("chat_type").unwrap_or("unknown");
            out.push_str(&format!("\n{}: {} [{}]", chat.uid, chat.name, chat_type));
        }
        Ok(out)
    }

    async fn search_users(&self, args: &str) -> Result<String> {
        let nodes = self.client.search_users(args, SEARCH_LIMIT).await?;
        let mut out = found_line(nodes.len(), "user", "users");
        append_results(&mut out, &nodes, false);
        Ok(out)
    }

    async fn search_groups(&self, args: &str) -> Result<String> {
        let nodes = self.client.search_groups(args, SEARCH_LIMIT).await?;
        let mut out = found_line(nodes.len(), "group", "groups");
        append_results(&mut out, &nodes, false);
        Ok(out)
    }

    async fn search_pages(&self, args: &str) -> Result<String> {
        let nodes = self.client.search_pages(args, SEARCH_LIMIT).await?;
        let mut out = found_line(nodes.len(), "page", "pages");
        append_results(&mut out, &nodes, false);
        Ok(out)
    }

    async fn search_threads(&self, args: &str) -> Result<String> {
        let nodes = self.client.search_threads(args, SEARCH_LIMIT).await?;
        let mut out = found_line(nodes.len(), "thread", "threads");
        append_results(&mut out, &nodes, true);
        Ok(out)
    }

    async fn add_to_group(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.split(' ').collect();
        if parts.len() < 2 {
            return Ok("Group ID and user IDs are required".to_string());
        }
        let group = ThreadId::new(parts[0]);
        let users: Vec<ThreadId> = parts[1..].iter().map(|id| ThreadId::new(*id)).collect();
        self.client.add_group_members(&group, &users).await?;
        Ok(if parts.len() == 2 {
            format!(
                "User {} is successfully added to group {}.",
                parts[1], parts[0]
            )
        } else {
            format!(
                "Users {} are successfully added to group {}.",
                parts[1..].join(", "),
                parts[0]
            )
        })
    }

    async fn remove_from_group(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.split(' ').collect();
        if parts.len() != 2 {
            return Ok("Group ID and user ID are required.".to_string());
        }
        self.client
            .remove_group_member(&ThreadId::new(parts[0]), &ThreadId::new(parts[1]))
            .await?;
        Ok(format!(
            "User {} is successfully removed from group {}.",
            parts[1], parts[0]
        ))
    }

    async fn set_nickname(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.splitn(2, ' ').collect();
        if parts.len() < 2 {
            return Ok("User ID and nickname are required.".to_string());
        }
        let user = ThreadId::new(parts[0]);
        self.client.set_nickname(&user, &user, parts[1]).await?;
        Ok(format!("Nickname of {} is set to {}.", parts[0], parts[1]))
    }

    async fn set_group_title(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.splitn(2, ' ').collect();
        if parts.len() < 2 {
            return Ok("User ID and title are required.".to_string());
        }
        self.client
            .set_group_title(&ThreadId::new(parts[0]), parts[1])
            .await?;
        Ok(format!("Title of group {} is set to {}.", parts[0], parts[1]))
    }

    async fn set_chat_emoji(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.splitn(2, ' ').collect();
        if parts.len() < 2 {
            return Ok("User ID and emoji are required.".to_string());
        }
        self.client
            .set_chat_emoji(&ThreadId::new(parts[0]), parts[1])
            .await?;
        Ok(format!("Emoji of group {} is set to {}.", parts[0], parts[1]))
    }

    async fn set_member_nickname(&self, args: &str) -> Result<String> {
        let parts: Vec<&str> = args.splitn(3, ' ').collect();
        if parts.len() < 3 {
            return Ok("Group ID, member ID and nickname are required.".to_string());
        }
        self.client
            .set_nickname(&ThreadId::new(parts[0]), &ThreadId::new(parts[1]), parts[2])
            .await?;
        Ok(format!(
            "Nickname of {} in {} is set as {}.",
            parts[1], parts[0], parts[2]
        ))
    }
}

fn found_line(count: usize, singular: &str, plural: &str) -> String {
    let noun = if count == 1 { singular } else { plural };
    format!("Found {count} {noun}.\n")
}

fn append_results(out: &mut String, nodes: &[Value], with_type: bool) {
    for node in nodes {
        let uid = get_str(node, &["id"]).unwrap_or("");
        let name = get_str(node, &["name"]).unwrap_or("");
        if with_type {
            let typename = get_str(node, &["__typename"]).unwrap_or("unknown");
            out.push_str(&format!("\n{uid}: {name} [{typename}]"));
        } else {
            out.push_str(&format!("\n{uid}: {name}"));
        }
    }
}
