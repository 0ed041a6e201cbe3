use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::slack::client::SlackApi;
use crate::slack::models::SlackUser;

/// One successful `users.list` result plus point-lookup indexes over it.
/// Always rebuilt as a whole, so the indexes never disagree with `users`.
#[derive(Debug)]
struct Snapshot {
    users: Vec<SlackUser>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    fn build(users: Vec<SlackUser>) -> Self {
        let mut by_id = HashMap::with_capacity(users.len());
        let mut by_name = HashMap::with_capacity(users.len());
        for (idx, user) in users.iter().enumerate() {
            // First entry wins, matching a front-to-back scan.
            by_id.entry(user.id.clone()).or_insert(idx);
            by_name.entry(user.name.clone()).or_insert(idx);
        }
        Self {
            users,
            by_id,
            by_name,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
enum DirectoryState {
    #[default]
    Unfetched,
    Populated(Snapshot),
}

/// Lazily fetched copy of the workspace user list for one session.
///
/// A failed fetch never discards what is already cached.
#[derive(Debug, Default)]
pub struct UserDirectory {
    state: DirectoryState,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any fetch has succeeded, even if it returned no users.
    pub fn is_fetched(&self) -> bool {
        matches!(self.state, DirectoryState::Populated(_))
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            DirectoryState::Populated(snap) => Some(snap.fetched_at),
            DirectoryState::Unfetched => None,
        }
    }

    /// Current cache contents without touching the network.
    pub fn cached(&self) -> &[SlackUser] {
        match &self.state {
            DirectoryState::Populated(snap) => &snap.users,
            DirectoryState::Unfetched => &[],
        }
    }

    /// Return the user list, fetching it first if `force_refresh` is set or
    /// nothing has been fetched yet. On failure the previous contents are
    /// returned unchanged.
    pub async fn get_users(&mut self, api: &dyn SlackApi, force_refresh: bool) -> &[SlackUser] {
        if force_refresh || !self.is_fetched() {
            match api.list_users().await {
                Ok(users) => {
                    info!(count = users.len(), "fetched Slack users");
                    self.state = DirectoryState::Populated(Snapshot::build(users));
                }
                Err(e) => {
                    warn!(error = %e, cached = self.cached().len(), "failed to fetch Slack users");
                }
            }
        }
        self.cached()
    }

    /// Find a user by Slack ID, fetching the directory first if it is cold.
    pub async fn user_by_id(&mut self, api: &dyn SlackApi, user_id: &str) -> Option<&SlackUser> {
        self.get_users(api, false).await;
        self.lookup(|snap| snap.by_id.get(user_id).copied())
    }

    /// Find a user by Slack handle, fetching the directory first if it is cold.
    pub async fn user_by_name(&mut self, api: &dyn SlackApi, name: &str) -> Option<&SlackUser> {
        self.get_users(api, false).await;
        self.lookup(|snap| snap.by_name.get(name).copied())
    }

    /// Forget the cached list so the next access fetches again.
    pub fn invalidate(&mut self) {
        self.state = DirectoryState::Unfetched;
    }

    fn lookup(&self, index: impl FnOnce(&Snapshot) -> Option<usize>) -> Option<&SlackUser> {
        match &self.state {
            DirectoryState::Populated(snap) => index(snap).map(|idx| &snap.users[idx]),
            DirectoryState::Unfetched => None,
        }
    }
}
