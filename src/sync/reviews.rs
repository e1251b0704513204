//! Reviews Controller
//!
//! Child reviews of one parent domain (food or pokemon). Reviews are
//! fetched lazily per parent when its panel opens and cached by parent
//! id. The change listener re-fetches a parent's reviews only when that
//! parent is already cached; everything else is ignored until the panel
//! is opened.
//!
//! Fetches carry a per-parent generation so a response that lost a race,
//! or that arrives after the parent was deleted, never lands in the cache.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::fetcher::FetchOutcome;
use super::listener::{listen, ListenerHandle};
use crate::commands::{Confirm, MutationError, ReviewMutations};
use crate::components::{PanelState, ReviewPanel, ReviewsSnapshot};
use crate::domain::{ChildRecord, RecordId, UserId};
use crate::notice::NoticeBoard;
use crate::repository::{decode_rows, ChangeEvent, ChangeFeed, ListQuery, RecordBackend};
use crate::session::{Session, SessionProvider};
use crate::store::{ChildCache, ChildPurge};

struct ReviewsInner<C: ChildRecord> {
    backend: Arc<dyn RecordBackend>,
    feed: Arc<dyn ChangeFeed>,
    session: Arc<dyn SessionProvider>,
    notices: NoticeBoard,
    cache: ChildCache<C>,
    panel: watch::Sender<ReviewPanel>,
    loading_parent: watch::Sender<Option<RecordId>>,
    generations: Mutex<HashMap<RecordId, u64>>,
    mutations: ReviewMutations<C>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl<C: ChildRecord> ReviewsInner<C> {
    fn next_generation(&self, parent_id: &str) -> u64 {
        let mut generations = self.generations.lock();
        let generation = generations.entry(parent_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Orphan every in-flight fetch
    fn invalidate_all(&self) {
        for generation in self.generations.lock().values_mut() {
            *generation += 1;
        }
        self.loading_parent.send_replace(None);
    }

    async fn fetch_children(&self, parent_id: &str) -> FetchOutcome {
        let generation = self.next_generation(parent_id);
        self.loading_parent.send_replace(Some(parent_id.to_string()));

        let query = ListQuery::from_table(C::TABLE)
            .eq(C::PARENT_COLUMN, parent_id)
            .order_by("created_at", false);
        tracing::debug!("fetching {} of {} (generation {})", C::TABLE, parent_id, generation);
        let result = self.backend.select(&query).await.and_then(decode_rows::<C>);

        let generations = self.generations.lock();
        if generations.get(parent_id) != Some(&generation) {
            tracing::debug!("discarding stale {} of {}", C::TABLE, parent_id);
            return FetchOutcome::Stale;
        }
        self.loading_parent.send_if_modified(|loading| {
            if loading.as_deref() == Some(parent_id) {
                *loading = None;
                true
            } else {
                false
            }
        });

        match result {
            Ok(children) => {
                let count = children.len();
                self.cache.put(parent_id, children);
                FetchOutcome::Applied(count)
            }
            Err(e) => {
                tracing::error!("failed to fetch {} of {}: {}", C::TABLE, parent_id, e);
                self.notices.error(format!("Failed to fetch reviews: {}", e));
                FetchOutcome::Failed
            }
        }
    }

    /// Compose when the reviews are known and the user has none
    fn settle(&self, parent_id: &str) {
        if !self.cache.is_cached(parent_id) {
            return;
        }
        let user = self.session.user_id();
        let has_review = user
            .as_deref()
            .is_some_and(|user| self.cache.has_review_by(parent_id, user));
        self.panel
            .send_modify(|panel| panel.settle(parent_id, has_review, user.is_some()));
    }

    /// Refresh every cached parent the event touches; a review moved between
    /// parents touches both
    async fn on_change(&self, event: ChangeEvent) {
        let mut parents: Vec<RecordId> = Vec::new();
        for row in [&event.new, &event.old].into_iter().flatten() {
            if let Some(parent_id) = C::parent_of(row) {
                if !parents.iter().any(|p| p == parent_id) {
                    parents.push(parent_id.to_string());
                }
            }
        }
        if parents.is_empty() {
            tracing::debug!("{:?} on {} without a parent id", event.event, C::TABLE);
            return;
        }
        for parent_id in parents {
            if self.cache.is_cached(&parent_id) {
                self.fetch_children(&parent_id).await;
            }
        }
    }

    fn reopen_listener(self: &Arc<Self>) {
        let mut slot = self.listener.lock();
        slot.take();

        let weak: Weak<Self> = Arc::downgrade(self);
        let handler = move |event: ChangeEvent| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.on_change(event).await;
                }
            }
        };

        match listen(self.feed.as_ref(), C::TABLE, handler) {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                tracing::error!("failed to subscribe to {}: {}", C::TABLE, e);
                self.notices
                    .error(format!("Live updates for {} unavailable: {}", C::TABLE, e));
            }
        }
    }

    /// Forget cached reviews and the open panel
    fn reset(&self) {
        self.invalidate_all();
        self.cache.clear();
        self.panel.send_modify(ReviewPanel::close);
    }
}

impl<C: ChildRecord> ChildPurge for ReviewsInner<C> {
    fn purge_parent(&self, parent_id: &str) {
        self.next_generation(parent_id);
        self.loading_parent.send_if_modified(|loading| {
            if loading.as_deref() == Some(parent_id) {
                *loading = None;
                true
            } else {
                false
            }
        });
        if self.cache.purge(parent_id) {
            tracing::debug!("purged cached {} of {}", C::TABLE, parent_id);
        }
        self.panel.send_if_modified(|panel| {
            if panel.state().is_open_for(parent_id) {
                panel.close();
                true
            } else {
                false
            }
        });
    }
}

pub struct ReviewsController<C: ChildRecord> {
    inner: Arc<ReviewsInner<C>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<C: ChildRecord> ReviewsController<C> {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        feed: Arc<dyn ChangeFeed>,
        session: Arc<dyn SessionProvider>,
        notices: NoticeBoard,
    ) -> Self {
        let mutations = ReviewMutations::new(backend.clone(), session.clone(), notices.clone());
        let (panel, _rx) = watch::channel(ReviewPanel::new());
        let (loading_parent, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(ReviewsInner {
                backend,
                feed,
                session,
                notices,
                cache: ChildCache::new(),
                panel,
                loading_parent,
                generations: Mutex::new(HashMap::new()),
                mutations,
                listener: Mutex::new(None),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &ChildCache<C> {
        &self.inner.cache
    }

    pub fn panel_state(&self) -> PanelState {
        self.inner.panel.borrow().state().clone()
    }

    pub fn subscribe_panel(&self) -> watch::Receiver<ReviewPanel> {
        self.inner.panel.subscribe()
    }

    /// Parent whose reviews are being fetched
    pub fn loading_parent(&self) -> Option<RecordId> {
        self.inner.loading_parent.borrow().clone()
    }

    /// Handed to the parent's mutations so deletes drop cached reviews
    pub fn purger(&self) -> Arc<dyn ChildPurge> {
        self.inner.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.driver.lock().is_some()
    }

    pub fn mount(&self) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return;
        }
        tracing::debug!("mounting {} panel", C::TABLE);
        let inner = self.inner.clone();
        let mut session = inner.session.watch();
        let user = session.borrow_and_update().as_ref().map(|s| s.user_id.clone());
        inner.reopen_listener();
        *driver = Some(tokio::spawn(drive(inner, session, user)));
    }

    pub fn unmount(&self) {
        let Some(driver) = self.driver.lock().take() else {
            return;
        };
        driver.abort();
        self.inner.listener.lock().take();
        self.inner.reset();
        tracing::debug!("unmounted {} panel", C::TABLE);
    }

    /// Open the panel under `parent_id`, loading its reviews on first open
    pub async fn open(&self, parent_id: &str) {
        self.inner.panel.send_modify(|panel| panel.open(parent_id));
        if !self.inner.cache.is_cached(parent_id) {
            self.inner.fetch_children(parent_id).await;
        }
        self.inner.settle(parent_id);
    }

    /// Re-read one parent's reviews
    pub async fn fetch_children(&self, parent_id: &str) -> FetchOutcome {
        self.inner.fetch_children(parent_id).await
    }

    /// Edit the user's own review in the open panel
    pub fn start_edit(&self, review_id: &str) -> bool {
        let Some(parent_id) = self.panel_state().parent_id().map(str::to_string) else {
            return false;
        };
        let Some(review) = self
            .inner
            .cache
            .get(&parent_id)
            .and_then(|reviews| reviews.into_iter().find(|r| r.id() == review_id))
        else {
            return false;
        };
        let user = self.inner.session.user_id();
        let mut started = false;
        self.inner.panel.send_if_modified(|panel| {
            started = panel.start_edit(&review, user.as_deref());
            started
        });
        started
    }

    pub fn set_draft(&self, text: &str) {
        self.inner.panel.send_modify(|panel| panel.set_draft(text));
    }

    pub fn cancel(&self) {
        self.inner.panel.send_modify(ReviewPanel::cancel);
    }

    pub fn close(&self) {
        self.inner.panel.send_modify(ReviewPanel::close);
    }

    /// Submit the draft of the composer or editor
    pub async fn save(&self) -> Result<(), MutationError> {
        let state = self.panel_state();
        let (parent_id, review_id, draft) = match &state {
            PanelState::Composing { parent_id, draft } => (parent_id, None, draft),
            PanelState::Editing {
                parent_id,
                review_id,
                draft,
            } => (parent_id, Some(review_id.as_str()), draft),
            _ => {
                tracing::debug!("no review draft to save");
                return Ok(());
            }
        };
        if review_id.is_none() && self.own_review_cached(parent_id) {
            tracing::warn!("user already reviewed {}", parent_id);
        }

        self.inner.mutations.save(parent_id, review_id, draft).await?;
        self.inner.fetch_children(parent_id).await;
        self.inner.panel.send_modify(ReviewPanel::finish_save);
        Ok(())
    }

    /// Delete one of the user's reviews under `parent_id`
    pub async fn delete(
        &self,
        parent_id: &str,
        review_id: &str,
        confirm: &dyn Confirm,
    ) -> Result<(), MutationError> {
        self.inner.mutations.delete(review_id, confirm).await?;
        self.inner.fetch_children(parent_id).await;
        self.inner.panel.send_if_modified(|panel| {
            if panel.state().review_id() == Some(review_id) {
                panel.cancel();
                true
            } else {
                false
            }
        });
        self.inner.settle(parent_id);
        Ok(())
    }

    /// What the list needs to draw the panel
    pub fn snapshot(&self) -> ReviewsSnapshot<C> {
        ReviewsSnapshot {
            panel: self.panel_state(),
            reviews: self.inner.cache.snapshot(),
            loading_parent: self.loading_parent(),
            current_user_id: self.inner.session.user_id(),
        }
    }

    fn own_review_cached(&self, parent_id: &str) -> bool {
        self.inner
            .session
            .user_id()
            .is_some_and(|user| self.inner.cache.has_review_by(parent_id, &user))
    }
}

impl<C: ChildRecord> Drop for ReviewsController<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn drive<C: ChildRecord>(
    inner: Arc<ReviewsInner<C>>,
    mut session: watch::Receiver<Option<Session>>,
    mut user: Option<UserId>,
) {
    while session.changed().await.is_ok() {
        let next = session.borrow_and_update().as_ref().map(|s| s.user_id.clone());
        if next != user {
            tracing::info!("{} panel: user changed, resubscribing", C::TABLE);
            user = next;
            inner.reset();
            inner.reopen_listener();
        }
    }
}
