use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SlackSection;

use super::models::{
    ApiStatus, AuthIdentity, SlackUser, UserInfoResponse, UsersListResponse,
};

/// Page size requested from `users.list`.
const USERS_PAGE_LIMIT: u32 = 200;

/// The subset of the Slack Web API the gateway depends on.
///
/// Every call is a network round trip and may fail with a transport or
/// auth error. Callers decide how to degrade.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Verify the token and return who it belongs to.
    async fn auth_test(&self) -> Result<AuthIdentity>;

    /// Fetch the full workspace user list, following pagination.
    async fn list_users(&self) -> Result<Vec<SlackUser>>;

    /// Fetch a single user by ID.
    async fn user_info(&self, user_id: &str) -> Result<SlackUser>;
}

/// Slack Web API client authenticated with a single token.
pub struct SlackClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackClient {
    pub fn new(settings: &SlackSection, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build Slack HTTP client")?;

        Ok(Self {
            http,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// GET a Web API method and decode its payload, turning `ok: false`
    /// into an error carrying Slack's error code.
    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.api_url, method);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("HTTP request to Slack {method} failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Slack {} returned {}: {}", method, status, body_text));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .with_context(|| format!("Failed to read Slack {method} response"))?;

        let status: ApiStatus = serde_json::from_value(body.clone())
            .with_context(|| format!("Malformed Slack {method} response"))?;
        if !status.ok {
            return Err(anyhow!(
                "Slack {} failed: {}",
                method,
                status.error.as_deref().unwrap_or("unknown_error")
            ));
        }

        serde_json::from_value(body).with_context(|| format!("Unexpected Slack {method} payload"))
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn auth_test(&self) -> Result<AuthIdentity> {
        self.call("auth.test", &[]).await
    }

    async fn list_users(&self) -> Result<Vec<SlackUser>> {
        let limit = USERS_PAGE_LIMIT.to_string();
        let mut users = Vec::new();
        let mut cursor = String::new();

        loop {
            let mut query = vec![("limit", limit.as_str())];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: UsersListResponse = self.call("users.list", &query).await?;
            users.extend(page.members);

            cursor = page
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
            debug!(fetched = users.len(), "following users.list cursor");
        }

        Ok(users)
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser> {
        let resp: UserInfoResponse = self.call("users.info", &[("user", user_id)]).await?;
        Ok(resp.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_trailing_slash_is_trimmed() {
        let settings = SlackSection {
            api_url: "https://slack.com/api/".into(),
            request_timeout_secs: 5,
        };
        let client = SlackClient::new(&settings, "xoxp-test").unwrap();
        assert_eq!(client.api_url, "https://slack.com/api");
    }
}
