//! List Controller
//!
//! Owns one domain's query controller, record store, fetcher and change
//! listener. While mounted, a driver task re-fetches on every query change
//! and reopens the subscription when the signed-in user changes. Nothing
//! here is called by mutations: a write reaches the list only through the
//! change feed and the re-fetch it triggers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::fetcher::{FetchOutcome, SyncFetcher};
use super::listener::{listen, ListenerHandle};
use super::query_controller::{QueryController, QueryParams};
use crate::domain::{Entity, UserId};
use crate::notice::NoticeBoard;
use crate::repository::{ChangeEvent, ChangeFeed, RecordBackend};
use crate::session::{Session, SessionProvider};
use crate::store::RecordStore;

struct ListInner<T: Entity> {
    query: QueryController,
    store: RecordStore<T>,
    fetcher: SyncFetcher<T>,
    feed: Arc<dyn ChangeFeed>,
    session: Arc<dyn SessionProvider>,
    notices: NoticeBoard,
    listener: Mutex<Option<ListenerHandle>>,
}

impl<T: Entity> ListInner<T> {
    async fn refresh(&self) -> FetchOutcome {
        let params = self.query.params();
        let owner = self.session.user_id();
        self.fetcher.fetch(&params, owner.as_deref()).await
    }

    fn spawn_refresh(self: &Arc<Self>) {
        let inner = self.clone();
        tokio::spawn(async move {
            inner.refresh().await;
        });
    }

    /// Replace the subscription (dropping the old one first)
    fn reopen_listener(self: &Arc<Self>) {
        let mut slot = self.listener.lock();
        slot.take();

        let weak: Weak<Self> = Arc::downgrade(self);
        let handler = move |_event: ChangeEvent| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh().await;
                }
            }
        };

        match listen(self.feed.as_ref(), T::TABLE, handler) {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                tracing::error!("failed to subscribe to {}: {}", T::TABLE, e);
                self.notices
                    .error(format!("Live updates for {} unavailable: {}", T::TABLE, e));
            }
        }
    }
}

pub struct ListController<T: Entity> {
    inner: Arc<ListInner<T>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Entity> ListController<T> {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        feed: Arc<dyn ChangeFeed>,
        session: Arc<dyn SessionProvider>,
        notices: NoticeBoard,
    ) -> Self {
        let store = RecordStore::new();
        let fetcher = SyncFetcher::new(backend, store.clone(), notices.clone());
        fetcher.deactivate();
        Self {
            inner: Arc::new(ListInner {
                query: QueryController::for_entity::<T>(),
                store,
                fetcher,
                feed,
                session,
                notices,
                listener: Mutex::new(None),
            }),
            driver: Mutex::new(None),
        }
    }

    pub fn query(&self) -> &QueryController {
        &self.inner.query
    }

    pub fn store(&self) -> &RecordStore<T> {
        &self.inner.store
    }

    pub fn is_loading(&self) -> bool {
        self.inner.fetcher.is_loading()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.fetcher.loading()
    }

    pub fn is_mounted(&self) -> bool {
        self.driver.lock().is_some()
    }

    /// Subscribe, fetch, and keep the list in sync until `unmount`
    pub fn mount(&self) {
        let mut driver = self.driver.lock();
        if driver.is_some() {
            return;
        }
        tracing::debug!("mounting {} list", T::TABLE);

        let inner = self.inner.clone();
        // Baseline before subscribing; any switch after this point resubscribes
        let mut params = inner.query.subscribe();
        let mut session = inner.session.watch();
        params.borrow_and_update();
        let user = session.borrow_and_update().as_ref().map(|s| s.user_id.clone());

        inner.fetcher.activate();
        inner.reopen_listener();
        inner.spawn_refresh();
        *driver = Some(tokio::spawn(drive(inner, params, session, user)));
    }

    /// Release the subscription and clear the store
    pub fn unmount(&self) {
        let Some(driver) = self.driver.lock().take() else {
            return;
        };
        driver.abort();
        self.inner.listener.lock().take();
        self.inner.fetcher.deactivate();
        self.inner.store.clear();
        tracing::debug!("unmounted {} list", T::TABLE);
    }

    /// Fetch now and wait for the outcome
    pub async fn refresh_now(&self) -> FetchOutcome {
        self.inner.refresh().await
    }
}

impl<T: Entity> Drop for ListController<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn drive<T: Entity>(
    inner: Arc<ListInner<T>>,
    mut params: watch::Receiver<QueryParams>,
    mut session: watch::Receiver<Option<Session>>,
    mut user: Option<UserId>,
) {
    loop {
        tokio::select! {
            changed = params.changed() => {
                if changed.is_err() {
                    break;
                }
                params.borrow_and_update();
                inner.spawn_refresh();
            }
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = session.borrow_and_update().as_ref().map(|s| s.user_id.clone());
                if next != user {
                    tracing::info!("{} list: user changed, resubscribing", T::TABLE);
                    user = next;
                    inner.store.clear();
                    inner.reopen_listener();
                    inner.spawn_refresh();
                }
            }
        }
    }
}
