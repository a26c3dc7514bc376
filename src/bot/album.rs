//! Album (media group) deduplication.
//!
//! Telegram delivers an album as separate messages sharing one media group
//! id. The first message admitted for a key owns the processing run; every
//! later message for that key is recorded as a member and its handler returns
//! silently. Keys expire after a fixed window and are swept lazily.

use super::media::IncomingMessage;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
struct AlbumEntry {
    expires_at: Instant,
    members: Vec<IncomingMessage>,
    drained: bool,
}

/// Table of recently seen album keys
#[derive(Debug)]
pub struct AlbumGate {
    ttl: Duration,
    entries: Mutex<HashMap<String, AlbumEntry>>,
}

impl AlbumGate {
    /// Create a gate that remembers keys for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Admit `member` under `key` using the current time
    ///
    /// Returns `true` only for the first message of an album.
    pub fn admit(&self, key: &str, member: IncomingMessage) -> bool {
        self.admit_at(key, member, Instant::now())
    }

    /// Admit `member` under `key` as of `now`
    ///
    /// Expired keys are dropped first. Check and insert happen under one lock.
    pub fn admit_at(&self, key: &str, member: IncomingMessage, now: Instant) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            warn!(album = %key, "Album table lock poisoned, admitting message");
            return true;
        };

        entries.retain(|_, entry| entry.expires_at > now);

        if let Some(entry) = entries.get_mut(key) {
            if !entry.drained {
                entry.members.push(member);
            }
            debug!(album = %key, "Album already admitted, suppressing duplicate run");
            return false;
        }

        entries.insert(
            key.to_string(),
            AlbumEntry {
                expires_at: now + self.ttl,
                members: vec![member],
                drained: false,
            },
        );
        true
    }

    /// Take the collected members of `key`, ordered by message id
    ///
    /// Members arriving afterwards are no longer collected.
    pub fn take_members(&self, key: &str) -> Vec<IncomingMessage> {
        let Ok(mut entries) = self.entries.lock() else {
            return Vec::new();
        };
        let Some(entry) = entries.get_mut(key) else {
            return Vec::new();
        };

        entry.drained = true;
        let mut members = std::mem::take(&mut entry.members);
        members.sort_by_key(|m| m.message_id);
        members.dedup_by_key(|m| m.message_id);
        members
    }

    /// Number of keys currently remembered, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether no keys are remembered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
