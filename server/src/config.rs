use serde::Deserialize;
use std::path::Path;
use tracing::info;

use anyhow::{Context, Result};

/// Top-level gateway configuration, loaded from slirc.toml.
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerSection,
    pub slack: SlackSection,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub irc_address: String,
    /// Name the gateway announces itself as in IRC replies.
    pub server_name: String,
    /// Path to TLS certificate file (PEM) for IRC. If set, IRC listens with TLS.
    pub irc_tls_cert: Option<String>,
    /// Path to TLS private key file (PEM) for IRC.
    pub irc_tls_key: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            irc_address: "127.0.0.1:6666".into(),
            server_name: "slirc".into(),
            irc_tls_cert: None,
            irc_tls_key: None,
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SlackSection {
    /// Base URL of the Slack Web API.
    pub api_url: String,
    /// Per-request timeout. A timed-out call counts as a failed fetch.
    pub request_timeout_secs: u64,
}

impl Default for SlackSection {
    fn default() -> Self {
        Self {
            api_url: "https://slack.com/api".into(),
            request_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {path}"))?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("IRC_ADDRESS") {
            self.server.irc_address = v;
        }
        if let Ok(v) = std::env::var("SERVER_NAME") {
            self.server.server_name = v;
        }
        if let Ok(v) = std::env::var("IRC_TLS_CERT") {
            self.server.irc_tls_cert = Some(v);
        }
        if let Ok(v) = std::env::var("IRC_TLS_KEY") {
            self.server.irc_tls_key = Some(v);
        }
        if let Ok(v) = std::env::var("SLACK_API_URL") {
            self.slack.api_url = v;
        }
        if let Ok(v) = std::env::var("SLACK_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.slack.request_timeout_secs = secs;
        }
    }
}
