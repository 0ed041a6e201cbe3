use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// Slack exposes two kinds of conversation that both look like `#channel` to
/// IRC clients but are mutated through different API methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Public or standard channel (`channels.*`).
    Channel,
    /// Private group (`groups.*`).
    Group,
}

/// Who joined and who left between two observations of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub joined: Vec<String>,
    pub left: Vec<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// In-memory state for a single bridged channel.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Slack conversation ID (`C...` or `G...`).
    pub id: String,
    pub name: String,
    pub topic: String,
    /// Slack user IDs of current members, without duplicates.
    members: Vec<String>,
    /// Recorded from the event or query that created this record; never re-derived.
    kind: ChannelKind,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(id: String, name: String, kind: ChannelKind) -> Self {
        Self {
            id,
            name,
            topic: String::new(),
            members: Vec::new(),
            kind,
            created_at: Utc::now(),
        }
    }

    /// Builder-style initial membership (deduplicated).
    pub fn with_members(mut self, members: &[String]) -> Self {
        self.set_members(members);
        self
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        self.kind == ChannelKind::Group
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Compare the last known membership against a fresh observation.
    ///
    /// Both sides are treated as sets. Does not modify `self`; the caller
    /// commits `observed` with [`Channel::set_members`] after consuming the diff.
    pub fn diff(&self, observed: &[String]) -> MembershipDiff {
        let current: HashSet<&str> = self.members.iter().map(String::as_str).collect();
        let fresh: HashSet<&str> = observed.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        let joined = observed
            .iter()
            .filter(|m| !current.contains(m.as_str()) && seen.insert(m.as_str()))
            .cloned()
            .collect();

        let left = self
            .members
            .iter()
            .filter(|m| !fresh.contains(m.as_str()))
            .cloned()
            .collect();

        MembershipDiff { joined, left }
    }

    /// Replace the membership, dropping duplicate IDs but keeping first-seen order.
    pub fn set_members(&mut self, members: &[String]) {
        let mut seen = HashSet::new();
        self.members = members
            .iter()
            .filter(|m| seen.insert(m.as_str()))
            .cloned()
            .collect();
    }
}
