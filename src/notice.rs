//! Transient user notices
//!
//! Success, info and error messages raised by fetches and mutations. The
//! board keeps them until dismissed and logs each one as it arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Oldest notices are dropped past this many
const MAX_NOTICES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct NoticeBoard {
    notices: Arc<Mutex<Vec<Notice>>>,
    next_id: Arc<AtomicU64>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Success, message.into())
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Info, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Error, message.into())
    }

    fn push(&self, level: NoticeLevel, message: String) -> u64 {
        match level {
            NoticeLevel::Error => tracing::warn!("notice: {}", message),
            _ => tracing::info!("notice: {}", message),
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut notices = self.notices.lock();
        notices.push(Notice { id, level, message });
        if notices.len() > MAX_NOTICES {
            let overflow = notices.len() - MAX_NOTICES;
            notices.drain(..overflow);
        }
        id
    }

    /// Notices not yet dismissed, oldest first
    pub fn active(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Most recent notice, if any
    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut notices = self.notices.lock();
        let before = notices.len();
        notices.retain(|n| n.id != id);
        notices.len() != before
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}
