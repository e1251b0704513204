//! Change Listener
//!
//! Forwards push events for one table to a handler. Each event runs the
//! handler on its own task, so bursts trigger independent re-fetches and
//! the fetcher's generation check decides which result lands.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::domain::Table;
use crate::repository::{BackendResult, ChangeEvent, ChangeFeed, SubscriptionGuard};

/// Open subscription plus its forwarding task. Dropping it releases both.
pub struct ListenerHandle {
    table: Table,
    task: JoinHandle<()>,
    _guard: SubscriptionGuard,
}

impl ListenerHandle {
    pub fn table(&self) -> Table {
        self.table
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("listener on {} released", self.table);
    }
}

/// Subscribe to `table` and run `on_event` for every change
pub fn listen<F, Fut>(feed: &dyn ChangeFeed, table: Table, on_event: F) -> BackendResult<ListenerHandle>
where
    F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (mut events, guard) = feed.subscribe(table)?.split();
    tracing::debug!("listening for changes on {}", table);

    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!("{:?} on {}", event.event, event.table);
            tokio::spawn(on_event(event));
        }
        tracing::debug!("change stream for {} ended", table);
    });

    Ok(ListenerHandle {
        table,
        task,
        _guard: guard,
    })
}
