//! Sync Integration Tests
//!
//! Fetch races against a scripted backend, then whole list and review
//! flows against the in-memory SQLite backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;

use super::*;
use crate::commands::{EntityMutations, FormState, MutationError, PokemonForm, TodoForm, FoodForm};
use crate::components::{food_empty_state, food_slots, render_card_list, CardListProps, CardListView, PanelState};
use crate::domain::{Food, FoodReview, MarkdownNote, Pokemon, Row, Table, Todo};
use crate::notice::{NoticeBoard, NoticeLevel};
use crate::repository::local::{LocalBackend, LocalStore, MemoryStorage};
use crate::repository::{BackendError, BackendResult, Filter, ListQuery, RecordBackend, RowScope};
use crate::session::{Session, SessionHandle};
use crate::store::RecordStore;

type Reply = oneshot::Sender<BackendResult<Vec<Row>>>;

/// Backend whose reads complete only when the test answers them
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<oneshot::Receiver<BackendResult<Vec<Row>>>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn expect_read(&self) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().push_back(rx);
        tx
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordBackend for ScriptedBackend {
    async fn select(&self, _query: &ListQuery) -> BackendResult<Vec<Row>> {
        let reply = self.replies.lock().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match reply {
            Some(rx) => rx.await.unwrap_or(Err(BackendError::ChannelClosed)),
            None => Ok(Vec::new()),
        }
    }

    async fn insert(&self, _table: Table, _row: Row) -> BackendResult<Row> {
        Err(BackendError::Unauthenticated)
    }

    async fn update(&self, _table: Table, _scope: &RowScope, _patch: Row) -> BackendResult<u64> {
        Err(BackendError::Unauthenticated)
    }

    async fn delete(&self, _table: Table, _scope: &RowScope) -> BackendResult<u64> {
        Err(BackendError::Unauthenticated)
    }
}

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn note_row(id: &str) -> Row {
    row(json!({
        "id": id,
        "description": format!("# {}", id),
        "user_id": "U1",
        "created_at": "2024-05-01T10:00:00Z"
    }))
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_for_calls(backend: &ScriptedBackend, calls: usize) {
    eventually(|| backend.calls() >= calls).await;
}

/// One signed-in client of a shared local store
struct Tab {
    backend: Arc<LocalBackend>,
    session: SessionHandle,
    storage: Arc<MemoryStorage>,
    notices: NoticeBoard,
}

impl Tab {
    fn new(store: &LocalStore, user: Option<&str>) -> Self {
        let session = match user {
            Some(user) => SessionHandle::signed_in(Session::for_user(user)),
            None => SessionHandle::signed_out(),
        };
        Self {
            backend: Arc::new(LocalBackend::new(store.clone(), Arc::new(session.clone()))),
            session,
            storage: Arc::new(MemoryStorage::new()),
            notices: NoticeBoard::new(),
        }
    }

    fn list<T: crate::domain::Entity>(&self) -> ListController<T> {
        ListController::new(
            self.backend.clone(),
            self.backend.clone(),
            Arc::new(self.session.clone()),
            self.notices.clone(),
        )
    }

    fn reviews(&self) -> ReviewsController<FoodReview> {
        ReviewsController::new(
            self.backend.clone(),
            self.backend.clone(),
            Arc::new(self.session.clone()),
            self.notices.clone(),
        )
    }

    fn mutations<F: crate::commands::EntityForm>(&self, store: &RecordStore<F::Record>) -> EntityMutations<F> {
        EntityMutations::new(
            self.backend.clone(),
            self.storage.clone(),
            Arc::new(self.session.clone()),
            self.notices.clone(),
            store.clone(),
        )
    }

    async fn insert(&self, table: Table, value: serde_json::Value) -> Row {
        self.backend.insert(table, row(value)).await.unwrap()
    }
}

fn id_of(row: &Row) -> String {
    row["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let backend = Arc::new(ScriptedBackend::default());
    let store = RecordStore::<MarkdownNote>::new();
    let fetcher = Arc::new(SyncFetcher::new(backend.clone(), store.clone(), NoticeBoard::new()));

    let slow = backend.expect_read();
    let fast = backend.expect_read();

    let first = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            let params = QueryParams {
                search: "old".into(),
                ..QueryParams::default()
            };
            fetcher.fetch(&params, Some("U1")).await
        })
    };
    wait_for_calls(&backend, 1).await;

    let second = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            let params = QueryParams {
                search: "new".into(),
                ..QueryParams::default()
            };
            fetcher.fetch(&params, Some("U1")).await
        })
    };
    wait_for_calls(&backend, 2).await;

    fast.send(Ok(vec![note_row("new")])).unwrap();
    assert_eq!(second.await.unwrap(), FetchOutcome::Applied(1));
    assert!(!fetcher.is_loading());

    slow.send(Ok(vec![note_row("old-1"), note_row("old-2")])).unwrap();
    assert_eq!(first.await.unwrap(), FetchOutcome::Stale);

    let items = store.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "new");
    assert_eq!(store.version(), 1);
}

#[tokio::test]
async fn test_loading_flag_brackets_fetch() {
    let backend = Arc::new(ScriptedBackend::default());
    let store = RecordStore::<MarkdownNote>::new();
    let fetcher = Arc::new(SyncFetcher::new(backend.clone(), store.clone(), NoticeBoard::new()));
    let reply = backend.expect_read();

    assert!(!fetcher.is_loading());
    let task = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move { fetcher.fetch(&QueryParams::default(), Some("U1")).await })
    };
    wait_for_calls(&backend, 1).await;
    assert!(fetcher.is_loading());

    reply.send(Ok(vec![])).unwrap();
    assert_eq!(task.await.unwrap(), FetchOutcome::Applied(0));
    assert!(!fetcher.is_loading());
}

#[tokio::test]
async fn test_failed_fetch_keeps_store_and_notifies() {
    let backend = Arc::new(ScriptedBackend::default());
    let store = RecordStore::<MarkdownNote>::new();
    let notices = NoticeBoard::new();
    let fetcher = SyncFetcher::new(backend.clone(), store.clone(), notices.clone());

    backend.expect_read().send(Ok(vec![note_row("kept")])).unwrap();
    fetcher.fetch(&QueryParams::default(), Some("U1")).await;

    backend
        .expect_read()
        .send(Err(BackendError::Transport("connection reset".into())))
        .unwrap();
    let outcome = fetcher.fetch(&QueryParams::default(), Some("U1")).await;

    assert_eq!(outcome, FetchOutcome::Failed);
    assert_eq!(store.items()[0].id, "kept");
    assert!(!fetcher.is_loading());
    let notice = notices.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.starts_with("Failed to fetch markdown_notes"));
}

#[tokio::test]
async fn test_owner_scoped_list_skips_without_session() {
    let backend = Arc::new(ScriptedBackend::default());
    let fetcher = SyncFetcher::new(backend.clone(), RecordStore::<Todo>::new(), NoticeBoard::new());

    assert_eq!(fetcher.fetch(&QueryParams::default(), None).await, FetchOutcome::Skipped);
    assert_eq!(backend.calls(), 0);
    assert!(!fetcher.is_loading());
}

#[tokio::test]
async fn test_buy_milk_scenario() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let list = tab.list::<Todo>();
    list.mount();
    let todos = tab.mutations::<TodoForm>(list.store());

    let mut form = FormState::<TodoForm>::new();
    form.values.title = "Buy milk".into();
    form.values.description = "2%  or whole".into();
    todos.submit(&mut form).await.unwrap();

    assert_eq!(form.values, TodoForm::default());
    assert_eq!(tab.notices.last().unwrap().message, "Successfully added todo!");

    eventually(|| list.store().len() == 1).await;
    let todo = list.store().items().remove(0);
    assert_eq!(todo.user_id, "U1");
    assert_eq!(todo.title, "Buy milk");
    assert_eq!(todo.description(), "2%  or whole");

    let mut edit = todos.start_edit(&todo);
    assert!(list.store().is_editing());
    edit.values.title = String::new();
    let err = todos.submit(&mut edit).await.unwrap_err();

    assert!(matches!(err, MutationError::Validation(_)));
    assert_eq!(edit.errors.get("title"), Some("Title is required"));
    assert!(list.store().is_editing());
    assert_eq!(list.refresh_now().await, FetchOutcome::Applied(1));
    assert_eq!(list.store().items()[0].title, "Buy milk");
}

#[tokio::test]
async fn test_update_clears_selection() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let list = tab.list::<Todo>();
    list.mount();
    let todos = tab.mutations::<TodoForm>(list.store());

    tab.insert(Table::Todos, json!({"title": "Buy milk", "description": "2%", "user_id": "U1"}))
        .await;
    eventually(|| list.store().len() == 1).await;

    let mut form = todos.start_edit(&list.store().items()[0]);
    form.values.title = "Buy oat milk".into();
    todos.submit(&mut form).await.unwrap();

    assert!(!list.store().is_editing());
    assert_eq!(tab.notices.last().unwrap().message, "Successfully updated todo!");
    eventually(|| list.store().items().first().is_some_and(|t| t.title == "Buy oat milk")).await;
}

#[tokio::test]
async fn test_taco_search_scenario() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    for (title, description) in [("Zesty", "Fish TACO bowl"), ("Alpha", "beef taco"), ("Mid", "ramen")] {
        tab.insert(
            Table::Foods,
            json!({"title": title, "description": description, "user_id": "U1"}),
        )
        .await;
    }

    let list = tab.list::<Food>();
    list.mount();
    list.query().set_search("taco");
    list.query().toggle_sort(SortField::Title);

    let params = list.query().params();
    assert_eq!((params.sort_field, params.sort_order), (SortField::Title, SortOrder::Asc));
    let query = params
        .to_list_query(&ListSpec::for_entity::<Food>(), Some("U1"))
        .unwrap();
    assert_eq!(
        query.filters,
        vec![Filter::ILike {
            column: "description".into(),
            needle: "taco".into()
        }]
    );

    eventually(|| {
        let titles: Vec<String> = list.store().items().iter().map(|f| f.title().to_string()).collect();
        titles == ["Alpha", "Zesty"]
    })
    .await;

    list.query().set_search("sushi");
    eventually(|| list.store().is_empty() && !list.is_loading()).await;

    let items = list.store().items();
    let empty = food_empty_state();
    let slots = food_slots(None, Default::default());
    let view = render_card_list(&CardListProps {
        items: &items,
        is_loading: list.is_loading(),
        empty_state: &empty,
        slots: &slots,
        current_user_id: Some("U1"),
        class_name: None,
    });
    assert_eq!(view, CardListView::Empty(food_empty_state()));
}

#[tokio::test]
async fn test_search_ignores_accented_case() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    for (title, description) in [("Dessert", "CRÈME BRÛLÉE"), ("Soup", "crema de elote")] {
        tab.insert(
            Table::Foods,
            json!({"title": title, "description": description, "user_id": "U1"}),
        )
        .await;
    }

    let list = tab.list::<Food>();
    list.mount();
    list.query().set_search("crème");
    eventually(|| {
        let titles: Vec<String> = list.store().items().iter().map(|f| f.title().to_string()).collect();
        titles == ["Dessert"]
    })
    .await;

    list.query().set_search("BRÛLÉE");
    eventually(|| list.store().len() == 1 && !list.is_loading()).await;
    assert_eq!(list.store().items()[0].title(), "Dessert");
}

#[tokio::test]
async fn test_two_tab_deletion() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab_a = Tab::new(&store, Some("U1"));
    let tab_b = Tab::new(&store, Some("U1"));

    let list_a = tab_a.list::<Pokemon>();
    let list_b = tab_b.list::<Pokemon>();
    list_a.mount();
    list_b.mount();

    let pikachu = tab_a
        .insert(
            Table::Pokemons,
            json!({"title": "Pikachu", "description": "Electric mouse", "user_id": "U1"}),
        )
        .await;
    eventually(|| list_b.store().len() == 1 && list_a.store().len() == 1).await;

    let pokemons = tab_a.mutations::<PokemonForm>(list_a.store());
    let record = list_a.store().find(&id_of(&pikachu)).unwrap();
    pokemons.delete(&record, &|_: &str| true).await.unwrap();
    assert_eq!(tab_a.notices.last().unwrap().message, "Pokémon entry deleted.");

    eventually(|| list_b.store().is_empty()).await;
    assert!(list_b.store().find(&id_of(&pikachu)).is_none());
}

#[tokio::test]
async fn test_unmount_releases_subscription() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    tab.insert(Table::Todos, json!({"title": "a", "user_id": "U1"})).await;

    let list = tab.list::<Todo>();
    list.mount();
    assert!(list.is_mounted());
    assert_eq!(store.subscriber_count(Table::Todos), 1);
    eventually(|| list.store().len() == 1).await;

    list.unmount();
    assert!(!list.is_mounted());
    assert_eq!(store.subscriber_count(Table::Todos), 0);
    assert!(list.store().is_empty());

    // nothing refills the store once unmounted
    tab.insert(Table::Todos, json!({"title": "b", "user_id": "U1"})).await;
    assert_eq!(list.refresh_now().await, FetchOutcome::Skipped);
    assert!(list.store().is_empty());

    list.mount();
    eventually(|| list.store().len() == 2).await;
    drop(list);
    assert_eq!(store.subscriber_count(Table::Todos), 0);
}

#[tokio::test]
async fn test_user_switch_resubscribes() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    tab.insert(Table::Todos, json!({"title": "mine", "user_id": "U1"})).await;

    let list = tab.list::<Todo>();
    list.mount();
    eventually(|| list.store().len() == 1).await;

    tab.session.sign_in(Session::for_user("U2"));
    eventually(|| list.store().is_empty() && !list.is_loading()).await;
    assert_eq!(store.subscriber_count(Table::Todos), 1);

    // U2's insert reaches the resubscribed listener
    tab.insert(Table::Todos, json!({"title": "theirs", "user_id": "U2"})).await;
    eventually(|| list.store().items().iter().any(|t| t.title == "theirs")).await;
    assert_eq!(list.store().len(), 1);

    tab.session.sign_out();
    eventually(|| list.store().is_empty()).await;
}

#[tokio::test]
async fn test_review_panel_flow() {
    let store = LocalStore::open_in_memory().unwrap();
    let owner = Tab::new(&store, Some("U2"));
    let tab = Tab::new(&store, Some("U1"));
    let food = owner
        .insert(Table::Foods, json!({"title": "Tacos", "description": "al pastor", "user_id": "U2"}))
        .await;
    let food_id = id_of(&food);

    let reviews = tab.reviews();
    reviews.mount();
    reviews.open(&food_id).await;
    assert!(matches!(reviews.panel_state(), PanelState::Composing { .. }));
    assert_eq!(reviews.cache().get(&food_id), Some(vec![]));

    reviews.set_draft("Great tacos");
    reviews.save().await.unwrap();
    assert_eq!(reviews.panel_state(), PanelState::Viewing { parent_id: food_id.clone() });
    assert_eq!(tab.notices.last().unwrap().message, "Review added!");
    let mine = reviews.cache().review_by(&food_id, "U1").unwrap();
    assert_eq!(mine.comment, "Great tacos");

    // reopening with an existing review stays in viewing
    reviews.close();
    reviews.open(&food_id).await;
    assert_eq!(reviews.panel_state(), PanelState::Viewing { parent_id: food_id.clone() });

    assert!(reviews.start_edit(&mine.id));
    reviews.set_draft("Even better tacos");
    reviews.save().await.unwrap();
    assert_eq!(tab.notices.last().unwrap().message, "Review updated!");
    assert_eq!(
        reviews.cache().review_by(&food_id, "U1").unwrap().comment,
        "Even better tacos"
    );

    let declined = reviews.delete(&food_id, &mine.id, &|_: &str| false).await;
    assert!(matches!(declined, Err(MutationError::Cancelled)));
    reviews
        .delete(&food_id, &mine.id, &|prompt: &str| prompt == "Delete this review?")
        .await
        .unwrap();
    assert_eq!(tab.notices.last().unwrap().message, "Review deleted");
    assert_eq!(reviews.cache().get(&food_id), Some(vec![]));
    assert!(matches!(reviews.panel_state(), PanelState::Composing { .. }));
}

#[tokio::test]
async fn test_empty_review_draft_is_rejected() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let food = tab
        .insert(Table::Foods, json!({"title": "Tacos", "user_id": "U1"}))
        .await;
    let reviews = tab.reviews();
    reviews.open(&id_of(&food)).await;

    reviews.set_draft("   ");
    let err = reviews.save().await.unwrap_err();
    assert!(matches!(err, MutationError::Validation(ref e) if e.get("comment") == Some("Comment is required")));
    assert!(matches!(reviews.panel_state(), PanelState::Composing { .. }));
}

#[tokio::test]
async fn test_child_listener_refetches_cached_parents_only() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let other = Tab::new(&store, Some("U2"));
    let opened = id_of(&tab.insert(Table::Foods, json!({"title": "a", "user_id": "U1"})).await);
    let closed = id_of(&tab.insert(Table::Foods, json!({"title": "b", "user_id": "U1"})).await);

    let reviews = tab.reviews();
    reviews.mount();
    reviews.open(&opened).await;

    other
        .insert(Table::FoodReviews, json!({"food_id": closed, "user_id": "U2", "comment": "meh"}))
        .await;
    other
        .insert(Table::FoodReviews, json!({"food_id": opened, "user_id": "U2", "comment": "yum"}))
        .await;

    eventually(|| reviews.cache().get(&opened).is_some_and(|r| r.len() == 1)).await;
    assert!(!reviews.cache().is_cached(&closed));
}

#[tokio::test]
async fn test_parent_delete_purges_cached_reviews() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let list = tab.list::<Food>();
    list.mount();
    let reviews = tab.reviews();
    reviews.mount();

    let food_id = id_of(&tab.insert(Table::Foods, json!({"title": "Tacos", "user_id": "U1"})).await);
    tab.insert(Table::FoodReviews, json!({"food_id": food_id, "user_id": "U1", "comment": "yum"}))
        .await;
    // the food list only listens on foods, so pick up the count by hand
    list.refresh_now().await;
    assert_eq!(list.store().find(&food_id).unwrap().reviewcount, Some(1));

    reviews.open(&food_id).await;
    assert_eq!(reviews.cache().get(&food_id).map(|r| r.len()), Some(1));

    let foods = tab
        .mutations::<FoodForm>(list.store())
        .with_child_purge(reviews.purger());
    let record = list.store().find(&food_id).unwrap();
    foods.delete(&record, &|_: &str| true).await.unwrap();

    assert!(!reviews.cache().is_cached(&food_id));
    assert_eq!(reviews.panel_state(), PanelState::Closed);
    eventually(|| list.store().is_empty()).await;
    // the cascade's review events find nothing cached to refresh
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!reviews.cache().is_cached(&food_id));
}

#[tokio::test]
async fn test_moved_review_refreshes_both_parents() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let first = id_of(&tab.insert(Table::Foods, json!({"title": "a", "user_id": "U1"})).await);
    let second = id_of(&tab.insert(Table::Foods, json!({"title": "b", "user_id": "U1"})).await);
    let review = tab
        .insert(Table::FoodReviews, json!({"food_id": first, "user_id": "U1", "comment": "yum"}))
        .await;

    let reviews = tab.reviews();
    reviews.mount();
    reviews.open(&first).await;
    reviews.open(&second).await;
    assert_eq!(reviews.cache().get(&first).map(|r| r.len()), Some(1));
    assert_eq!(reviews.cache().get(&second).map(|r| r.len()), Some(0));

    tab.backend
        .update(Table::FoodReviews, &RowScope::by_id(&id_of(&review)), row(json!({"food_id": second})))
        .await
        .unwrap();

    eventually(|| {
        reviews.cache().get(&first).is_some_and(|r| r.is_empty())
            && reviews.cache().get(&second).is_some_and(|r| r.len() == 1)
    })
    .await;
}

#[tokio::test]
async fn test_notes_title_sort_is_ignored() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    tab.insert(Table::MarkdownNotes, json!({"description": "# Groceries", "user_id": "U1"}))
        .await;

    let list = tab.list::<MarkdownNote>();
    list.mount();
    eventually(|| list.store().len() == 1).await;

    list.query().toggle_sort(SortField::Title);
    assert_eq!(list.query().params().sort_field, SortField::CreatedAt);
    assert_eq!(list.refresh_now().await, FetchOutcome::Applied(1));
    assert!(tab.notices.active().iter().all(|n| n.level != NoticeLevel::Error));
    assert_eq!(list.store().len(), 1);
}

#[tokio::test]
async fn test_sign_in_right_after_mount_resubscribes() {
    let store = LocalStore::open_in_memory().unwrap();
    let tab = Tab::new(&store, Some("U1"));
    let other = Tab::new(&store, Some("U2"));

    let list = tab.list::<Todo>();
    list.mount();
    // no await between mount and the switch
    tab.session.sign_in(Session::for_user("U2"));
    eventually(|| !list.is_loading()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(list.store().is_empty());

    other.insert(Table::Todos, json!({"title": "theirs", "user_id": "U2"})).await;
    eventually(|| list.store().items().iter().any(|t| t.title == "theirs")).await;
}
