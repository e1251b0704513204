//! Sync Fetcher
//!
//! Issues one filtered, sorted read and swaps the result into the record
//! store. Every request takes a generation number; a response older than
//! the newest request is dropped without touching the store, so a slow
//! stale read can never overwrite a newer one. The loading flag stays up
//! until the newest request finishes.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::query_controller::{ListSpec, QueryParams};
use crate::domain::Entity;
use crate::notice::NoticeBoard;
use crate::repository::{decode_rows, RecordBackend};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Store replaced with this many records
    Applied(usize),
    /// A newer request was issued while this one was in flight
    Stale,
    /// Nothing to read (inactive, or owner-scoped without a session)
    Skipped,
    /// Backend error, reported as a notice
    Failed,
}

struct FetchState {
    latest: u64,
    active: bool,
}

pub struct SyncFetcher<T: Entity> {
    backend: Arc<dyn RecordBackend>,
    store: RecordStore<T>,
    notices: NoticeBoard,
    spec: ListSpec,
    state: Mutex<FetchState>,
    loading: watch::Sender<bool>,
}

impl<T: Entity> SyncFetcher<T> {
    pub fn new(backend: Arc<dyn RecordBackend>, store: RecordStore<T>, notices: NoticeBoard) -> Self {
        let (loading, _rx) = watch::channel(false);
        Self {
            backend,
            store,
            notices,
            spec: ListSpec::for_entity::<T>(),
            state: Mutex::new(FetchState {
                latest: 0,
                active: true,
            }),
            loading,
        }
    }

    pub fn spec(&self) -> &ListSpec {
        &self.spec
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Accept fetches again
    pub fn activate(&self) {
        self.state.lock().active = true;
    }

    /// Refuse new fetches and orphan any in flight
    pub fn deactivate(&self) {
        let mut state = self.state.lock();
        state.active = false;
        state.latest += 1;
        self.loading.send_replace(false);
    }

    pub async fn fetch(&self, params: &QueryParams, owner: Option<&str>) -> FetchOutcome {
        let (generation, query) = {
            let mut state = self.state.lock();
            if !state.active {
                return FetchOutcome::Skipped;
            }
            state.latest += 1;
            match params.to_list_query(&self.spec, owner) {
                Some(query) => {
                    self.loading.send_replace(true);
                    (state.latest, query)
                }
                None => {
                    self.loading.send_replace(false);
                    tracing::debug!("skipping {} fetch: not signed in", self.spec.source.as_str());
                    return FetchOutcome::Skipped;
                }
            }
        };

        tracing::debug!("fetching {} (generation {})", self.spec.source.as_str(), generation);
        let result = self
            .backend
            .select(&query)
            .await
            .and_then(decode_rows::<T>);

        let state = self.state.lock();
        if state.latest != generation {
            tracing::debug!(
                "discarding stale {} response (generation {} < {})",
                self.spec.source.as_str(),
                generation,
                state.latest
            );
            return FetchOutcome::Stale;
        }
        self.loading.send_replace(false);

        match result {
            Ok(items) => {
                let count = items.len();
                self.store.replace(items);
                FetchOutcome::Applied(count)
            }
            Err(e) => {
                tracing::error!("failed to fetch {}: {}", self.spec.source.as_str(), e);
                self.notices
                    .error(format!("Failed to fetch {}: {}", self.spec.source.base_table(), e));
                FetchOutcome::Failed
            }
        }
    }
}
