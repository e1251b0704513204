//! Change Notifications
//!
//! Row-level change events pushed by the backend, and the subscription
//! handle that receives them for one table.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// `{event, schema, table, new?, old?}` as delivered by the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event: ChangeKind,
    pub schema: String,
    pub table: Table,
    #[serde(default)]
    pub new: Option<Row>,
    #[serde(default)]
    pub old: Option<Row>,
}

impl ChangeEvent {
    pub fn new(event: ChangeKind, table: Table, new: Option<Row>, old: Option<Row>) -> Self {
        Self {
            event,
            schema: "public".to_string(),
            table,
            new,
            old,
        }
    }

    /// String column from the new row, falling back to the old row
    pub fn column(&self, column: &str) -> Option<&str> {
        [&self.new, &self.old]
            .into_iter()
            .flatten()
            .find_map(|row| row.get(column).and_then(|v| v.as_str()))
    }
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Runs the unsubscribe action when dropped
pub struct SubscriptionGuard {
    release: Option<Release>,
}

impl SubscriptionGuard {
    fn new(release: Option<Release>) -> Self {
        Self { release }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Live subscription to one table. Dropping it unsubscribes.
pub struct ChangeSubscription {
    table: Table,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    guard: SubscriptionGuard,
}

impl ChangeSubscription {
    pub fn new(table: Table, events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self {
            table,
            events,
            guard: SubscriptionGuard::new(None),
        }
    }

    /// Run `release` when the subscription is dropped
    pub fn on_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.guard = SubscriptionGuard::new(Some(Box::new(release)));
        self
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Next event, or `None` once the channel is closed
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Already-delivered event, without waiting
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    /// Separate the event stream from the unsubscribe guard, so the stream
    /// can move into a task while the owner keeps control of the lifetime
    pub fn split(self) -> (mpsc::UnboundedReceiver<ChangeEvent>, SubscriptionGuard) {
        (self.events, self.guard)
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
