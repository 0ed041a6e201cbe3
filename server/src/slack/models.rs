use serde::{Deserialize, Serialize};

/// A member of the Slack workspace as returned by `users.list` / `users.info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    /// Workspace-unique user ID (e.g. `U024BE7LH`).
    pub id: String,
    /// Handle shown to IRC clients as the nickname.
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
}

impl SlackUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            real_name: String::new(),
            deleted: false,
            is_bot: false,
        }
    }
}

/// Identity of the token holder, from `auth.test`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthIdentity {
    pub user_id: String,
    pub user: String,
    #[serde(default)]
    pub team: String,
}

// ── Web API envelopes ──────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ApiStatus {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<SlackUser>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Deserialize)]
pub(crate) struct UserInfoResponse {
    pub user: SlackUser,
}
