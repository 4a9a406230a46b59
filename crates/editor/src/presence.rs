// Presence roster for one document channel.
//
// The realtime collaborator delivers `sync`, `join` and `leave` events keyed
// by presence key (the user id). The roster keeps the payloads per key and
// reports one active user per key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::session::{display_name_for, Identity, Session};

/// Realtime channel carrying presence for `document_id`.
pub fn channel_name(document_id: Uuid) -> String {
    format!("document:{document_id}")
}

/// What a participant tracks on the channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresencePayload {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub last_seen: DateTime<Utc>,
}

impl PresencePayload {
    pub fn for_identity(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            username: display_name_for(identity.email.as_deref()),
            last_seen: now,
        }
    }

    /// Payload for the local user. Anonymous sessions do not join presence.
    pub fn for_session(session: &Session, now: DateTime<Utc>) -> Option<Self> {
        session.identity().map(|identity| Self::for_identity(&identity, now))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    #[default]
    Online,
    Away,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub username: String,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub status: PresenceStatus,
}

impl From<&PresencePayload> for PresenceUser {
    fn from(payload: &PresencePayload) -> Self {
        Self {
            id: payload.user_id.clone(),
            email: payload.email.clone(),
            username: payload.username.clone(),
            last_seen: payload.last_seen,
            status: PresenceStatus::Online,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Full channel state, replacing whatever the roster held.
    Sync(BTreeMap<String, Vec<PresencePayload>>),
    Join { key: String, new_presences: Vec<PresencePayload> },
    Leave { key: String, left_presences: Vec<PresencePayload> },
}

#[derive(Debug, Clone)]
pub struct PresenceRoster {
    channel: String,
    entries: BTreeMap<String, Vec<PresencePayload>>,
}

impl PresenceRoster {
    pub fn new(document_id: Uuid) -> Self {
        Self { channel: channel_name(document_id), entries: BTreeMap::new() }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn apply(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Sync(state) => self.apply_sync(state),
            PresenceEvent::Join { key, new_presences } => self.join(key, new_presences),
            PresenceEvent::Leave { key, left_presences } => self.leave(&key, &left_presences),
        }
    }

    pub fn apply_sync(&mut self, state: BTreeMap<String, Vec<PresencePayload>>) {
        self.entries = state.into_iter().filter(|(_, payloads)| !payloads.is_empty()).collect();
        debug!(channel = %self.channel, viewers = self.entries.len(), "presence synced");
    }

    pub fn join(&mut self, key: String, presences: Vec<PresencePayload>) {
        if presences.is_empty() {
            return;
        }
        debug!(channel = %self.channel, %key, "presence joined");
        self.entries.entry(key).or_default().extend(presences);
    }

    pub fn leave(&mut self, key: &str, presences: &[PresencePayload]) {
        let Some(current) = self.entries.get_mut(key) else {
            return;
        };
        current.retain(|payload| !presences.contains(payload));
        if current.is_empty() {
            self.entries.remove(key);
        }
        debug!(channel = %self.channel, %key, "presence left");
    }

    /// One user per presence key, ordered by user id.
    pub fn active_users(&self) -> Vec<PresenceUser> {
        let mut users: Vec<PresenceUser> = self
            .entries
            .values()
            .filter_map(|payloads| payloads.first())
            .map(PresenceUser::from)
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        users
    }

    pub fn viewer_count(&self) -> usize {
        self.entries.len()
    }
}
