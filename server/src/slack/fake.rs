//! In-memory `SlackApi` used by unit tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::client::SlackApi;
use super::models::{AuthIdentity, SlackUser};

#[derive(Default)]
pub struct FakeSlack {
    users: Mutex<Vec<SlackUser>>,
    /// IDs whose `users.info` lookup fails even if the user exists.
    broken_ids: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    list_calls: AtomicUsize,
    info_calls: AtomicUsize,
    /// Artificial latency for `users.info`, in milliseconds.
    info_delay_ms: AtomicU64,
    info_in_flight: AtomicUsize,
    info_peak_in_flight: AtomicUsize,
}

impl FakeSlack {
    pub fn with_users(users: Vec<SlackUser>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    pub fn set_users(&self, users: Vec<SlackUser>) {
        *self.users.lock().unwrap() = users;
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn break_user_info(&self, user_id: &str) {
        self.broken_ids.lock().unwrap().insert(user_id.to_string());
    }

    pub fn set_info_delay(&self, delay: Duration) {
        self.info_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Most `users.info` calls that were ever outstanding at once.
    pub fn peak_info_in_flight(&self) -> usize {
        self.info_peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn auth_test(&self) -> Result<AuthIdentity> {
        Ok(AuthIdentity {
            user_id: "U0SELF".into(),
            user: "self".into(),
            team: "test-team".into(),
        })
    }

    async fn list_users(&self) -> Result<Vec<SlackUser>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(anyhow!("Slack users.list failed: ratelimited"));
        }
        Ok(self.users.lock().unwrap().clone())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.info_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.info_peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.info_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let result = if self.broken_ids.lock().unwrap().contains(user_id) {
            Err(anyhow!("Slack users.info failed: user_not_found"))
        } else {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or_else(|| anyhow!("Slack users.info failed: user_not_found"))
        };
        self.info_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
