use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use crate::slack::client::SlackApi;
use crate::slack::models::SlackUser;

use super::channel::{Channel, MembershipDiff};
use super::directory::UserDirectory;

/// Unique identifier for a connected session (one per connection).
pub type SessionId = Uuid;

/// Username segment used in masks when the session's own identity can't be resolved.
pub const UNKNOWN_USERNAME: &str = "unknown";

/// Most `users.info` lookups kept in flight at once when resolving a roster.
/// Slack rate-limits per method, so a whole channel at once gets rejected.
pub const USER_INFO_CONCURRENCY: usize = 4;

/// Everything the gateway knows about one IRC connection and the Slack
/// session behind it.
///
/// Owned by the task that serves the connection. Other tasks only reach it
/// through the session registry.
pub struct SessionContext {
    pub id: SessionId,
    /// Remote endpoint of the IRC client.
    pub peer: SocketAddr,
    pub nick: String,
    pub username: String,
    pub real_name: String,
    /// Name the gateway announces in replies.
    pub server_name: String,
    /// Set once the Slack token has been verified.
    pub slack_connected: bool,
    pub connected_at: DateTime<Utc>,
    slack: Arc<dyn SlackApi>,
    /// Bridged channels keyed by IRC name (Slack naming is case-sensitive).
    channels: HashMap<String, Channel>,
    directory: UserDirectory,
}

impl SessionContext {
    pub fn new(
        peer: SocketAddr,
        nick: String,
        username: String,
        real_name: String,
        server_name: String,
        slack: Arc<dyn SlackApi>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            nick,
            username,
            real_name,
            server_name,
            slack_connected: false,
            connected_at: Utc::now(),
            slack,
            channels: HashMap::new(),
            directory: UserDirectory::new(),
        }
    }

    // ── User directory ──────────────────────────────────────────────

    /// Workspace users, fetched if `refresh` is set or the cache is cold.
    pub async fn get_users(&mut self, refresh: bool) -> &[SlackUser] {
        self.directory.get_users(self.slack.as_ref(), refresh).await
    }

    pub async fn get_user_info(&mut self, user_id: &str) -> Option<&SlackUser> {
        self.directory.user_by_id(self.slack.as_ref(), user_id).await
    }

    pub async fn get_user_info_by_name(&mut self, name: &str) -> Option<&SlackUser> {
        self.directory.user_by_name(self.slack.as_ref(), name).await
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    // ── Identity ────────────────────────────────────────────────────

    /// The client's IRC mask, `nick!username@ip`.
    ///
    /// Without a username, the nick is looked up in the directory and the
    /// matching Slack ID is used instead, or `unknown` if there is none.
    pub async fn mask(&mut self) -> String {
        let username = if self.username.is_empty() {
            let nick = self.nick.clone();
            self.get_user_info_by_name(&nick)
                .await
                .map(|user| user.id.clone())
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_string())
        } else {
            self.username.clone()
        };
        format!("{}!{}@{}", self.nick, username, self.peer.ip())
    }

    /// Translate Slack user IDs to handles with live `users.info` lookups,
    /// at most [`USER_INFO_CONCURRENCY`] at a time. IDs that fail to resolve
    /// are passed through unchanged, in place.
    pub async fn user_ids_to_names(&self, user_ids: &[String]) -> Vec<String> {
        stream::iter(user_ids)
            .map(|uid| async move {
                match self.slack.user_info(uid).await {
                    Ok(user) => user.name,
                    Err(_) => uid.clone(),
                }
            })
            .buffered(USER_INFO_CONCURRENCY)
            .collect()
            .await
    }

    // ── Channels ────────────────────────────────────────────────────

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Start tracking a channel, replacing any previous record with the same name.
    pub fn track_channel(&mut self, channel: Channel) {
        self.channels.insert(channel.name.clone(), channel);
    }

    pub fn forget_channel(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(name)
    }

    /// Diff a channel against freshly observed membership, then store the
    /// observation. Returns `None` if the channel isn't tracked.
    pub fn reconcile_members(
        &mut self,
        name: &str,
        observed: &[String],
    ) -> Option<MembershipDiff> {
        let channel = self.channels.get_mut(name)?;
        let diff = channel.diff(observed);
        channel.set_members(observed);
        Some(diff)
    }

    /// Returns false if the channel isn't tracked.
    pub fn set_topic(&mut self, name: &str, topic: String) -> bool {
        match self.channels.get_mut(name) {
            Some(channel) => {
                channel.topic = topic;
                true
            }
            None => false,
        }
    }
}
