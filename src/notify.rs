//! Transient user-facing notifications.

use serde::Serialize;
use std::sync::Mutex;

use crate::logging::{self, ts_epoch_ms, v_str, Domain};

pub const DEFAULT_TTL_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_ms: u64,
    pub ttl_ms: u64,
}

impl Notification {
    pub fn is_active_at(&self, now_ms: u64) -> bool {
        now_ms < self.created_ms.saturating_add(self.ttl_ms)
    }
}

/// Queue of notifications; expired entries are dropped lazily.
#[derive(Debug)]
pub struct Notifier {
    ttl_ms: u64,
    inner: Mutex<Queue>,
}

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    items: Vec<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_MS)
    }
}

impl Notifier {
    pub fn new(ttl_ms: u64) -> Self {
        Self { ttl_ms, inner: Mutex::new(Queue::default()) }
    }

    pub fn push_at(&self, level: NotificationLevel, message: impl Into<String>, now_ms: u64) -> u64 {
        let message = message.into();
        let mut queue = match self.inner.lock() {
            Ok(q) => q,
            Err(poisoned) => poisoned.into_inner(),
        };
        queue.items.retain(|n| n.is_active_at(now_ms));
        queue.next_id += 1;
        let id = queue.next_id;
        logging::info(
            Domain::System,
            "notify",
            &[("level", v_str(&format!("{:?}", level).to_lowercase())), ("msg", v_str(&message))],
        );
        queue.items.push(Notification {
            id,
            level,
            message,
            created_ms: now_ms,
            ttl_ms: self.ttl_ms,
        });
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push_at(NotificationLevel::Info, message, ts_epoch_ms())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push_at(NotificationLevel::Error, message, ts_epoch_ms())
    }

    pub fn active_at(&self, now_ms: u64) -> Vec<Notification> {
        let mut queue = match self.inner.lock() {
            Ok(q) => q,
            Err(poisoned) => poisoned.into_inner(),
        };
        queue.items.retain(|n| n.is_active_at(now_ms));
        queue.items.clone()
    }

    pub fn active(&self) -> Vec<Notification> {
        self.active_at(ts_epoch_ms())
    }
}
