//! Client-Side Record Stores
//!
//! Per-domain list cache with a single selected-record slot, and the
//! lazily filled cache of reviews keyed by parent id. Both publish every
//! change on a watch channel so views and tests can observe them.
//!
//! The list is written only by the sync fetcher (`replace` is crate
//! private); everything else reads, selects or clears.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{ChildRecord, Entity, RecordId};

/// Snapshot of one domain's list
#[derive(Debug, Clone)]
pub struct StoreState<T> {
    pub items: Vec<T>,
    /// Record loaded into the form; present means edit mode
    pub selected: Option<T>,
    /// Bumped on every list replacement
    pub version: u64,
}

impl<T> Default for StoreState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            version: 0,
        }
    }
}

#[derive(Clone)]
pub struct RecordStore<T: Entity> {
    state: Arc<watch::Sender<StoreState<T>>>,
}

impl<T: Entity> Default for RecordStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> RecordStore<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreState::default());
        Self { state: Arc::new(tx) }
    }

    pub fn items(&self) -> Vec<T> {
        self.state.borrow().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, id: &str) -> Option<T> {
        self.state.borrow().items.iter().find(|item| item.id() == id).cloned()
    }

    pub fn version(&self) -> u64 {
        self.state.borrow().version
    }

    pub fn selected(&self) -> Option<T> {
        self.state.borrow().selected.clone()
    }

    pub fn is_editing(&self) -> bool {
        self.state.borrow().selected.is_some()
    }

    /// Load a record into the form
    pub fn select(&self, item: T) {
        self.state.send_modify(|state| state.selected = Some(item));
    }

    /// Back to create mode
    pub fn clear_selection(&self) {
        self.state
            .send_if_modified(|state| state.selected.take().is_some());
    }

    /// Clear the selection only when it holds `id`
    pub fn clear_selection_if(&self, id: &str) -> bool {
        self.state.send_if_modified(|state| {
            if state.selected.as_ref().is_some_and(|s| s.id() == id) {
                state.selected = None;
                true
            } else {
                false
            }
        })
    }

    /// Swap in a freshly fetched list
    pub(crate) fn replace(&self, items: Vec<T>) {
        self.state.send_modify(|state| {
            state.items = items;
            state.version += 1;
        });
    }

    /// Drop list and selection (unmount, user switch)
    pub fn clear(&self) {
        self.state.send_modify(|state| {
            state.items.clear();
            state.selected = None;
            state.version += 1;
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<T>> {
        self.state.subscribe()
    }
}

/// Removes cached children of a deleted parent
pub trait ChildPurge: Send + Sync {
    fn purge_parent(&self, parent_id: &str);
}

/// Reviews per parent, fetched when a panel first opens
#[derive(Clone)]
pub struct ChildCache<C: ChildRecord> {
    children: Arc<watch::Sender<HashMap<RecordId, Vec<C>>>>,
}

impl<C: ChildRecord> Default for ChildCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ChildRecord> ChildCache<C> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HashMap::new());
        Self {
            children: Arc::new(tx),
        }
    }

    pub fn get(&self, parent_id: &str) -> Option<Vec<C>> {
        self.children.borrow().get(parent_id).cloned()
    }

    /// Every cached parent with its reviews
    pub fn snapshot(&self) -> HashMap<RecordId, Vec<C>> {
        self.children.borrow().clone()
    }

    pub fn is_cached(&self, parent_id: &str) -> bool {
        self.children.borrow().contains_key(parent_id)
    }

    pub(crate) fn put(&self, parent_id: &str, children: Vec<C>) {
        self.children.send_modify(|map| {
            map.insert(parent_id.to_string(), children);
        });
    }

    pub fn purge(&self, parent_id: &str) -> bool {
        self.children
            .send_if_modified(|map| map.remove(parent_id).is_some())
    }

    /// The user's own review among the cached children
    pub fn review_by(&self, parent_id: &str, user_id: &str) -> Option<C> {
        self.children
            .borrow()
            .get(parent_id)?
            .iter()
            .find(|c| c.owner_id() == Some(user_id))
            .cloned()
    }

    /// Soft one-review-per-user check over cached children only
    pub fn has_review_by(&self, parent_id: &str, user_id: &str) -> bool {
        self.review_by(parent_id, user_id).is_some()
    }

    pub fn clear(&self) {
        self.children.send_if_modified(|map| {
            let had = !map.is_empty();
            map.clear();
            had
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<HashMap<RecordId, Vec<C>>> {
        self.children.subscribe()
    }
}
