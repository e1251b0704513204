//! Mutation Command Tests
//!
//! Create, update and delete against the in-memory SQLite backend and
//! memory object storage.

use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::domain::{Food, GoogleDriveFile, ReadSource, Row, Table, Todo};
use crate::notice::{NoticeBoard, NoticeLevel};
use crate::repository::local::{LocalBackend, LocalStore, MemoryStorage, LOCAL_STORAGE_BASE};
use crate::repository::{decode_rows, ListQuery, RecordBackend};
use crate::session::{Session, SessionHandle};
use crate::store::RecordStore;

struct Harness {
    backend: Arc<LocalBackend>,
    storage: MemoryStorage,
    session: SessionHandle,
    notices: NoticeBoard,
}

impl Harness {
    fn new(store: &LocalStore, user: Option<&str>) -> Self {
        let session = match user {
            Some(user) => SessionHandle::signed_in(Session::for_user(user)),
            None => SessionHandle::signed_out(),
        };
        Self {
            backend: Arc::new(LocalBackend::new(store.clone(), Arc::new(session.clone()))),
            storage: MemoryStorage::new(),
            session,
            notices: NoticeBoard::new(),
        }
    }

    fn mutations<F: EntityForm>(&self, store: &RecordStore<F::Record>) -> EntityMutations<F> {
        EntityMutations::new(
            self.backend.clone(),
            Arc::new(self.storage.clone()),
            Arc::new(self.session.clone()),
            self.notices.clone(),
            store.clone(),
        )
    }

    async fn read<T: crate::domain::Entity>(&self, source: ReadSource) -> Vec<T> {
        let rows = self.backend.select(&ListQuery::from_source(source)).await.unwrap();
        decode_rows(rows).unwrap()
    }

    async fn foods(&self) -> Vec<Food> {
        self.read(ReadSource::FoodsWithReviewCount).await
    }

    fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .active()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }
}

fn food_form(title: &str, photo: PhotoInput) -> FormState<FoodForm> {
    let mut form = FormState::<FoodForm>::new();
    form.values = FoodForm {
        title: title.into(),
        description: "al pastor".into(),
        photo,
    };
    form
}

fn taco_photo() -> PhotoInput {
    PhotoInput::New(PhotoUpload::new("my taco.png", vec![1, 2, 3]))
}

#[tokio::test]
async fn test_create_uploads_photo_first() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let foods = h.mutations::<FoodForm>(&RecordStore::new());

    let mut form = food_form("Tacos", taco_photo());
    foods.submit(&mut form).await.unwrap();

    assert!(form.values.photo.is_empty());
    assert!(form.preview_url().is_none());
    assert_eq!(h.storage.len(), 1);

    let stored = h.foods().await;
    assert_eq!(stored.len(), 1);
    let url = stored[0].food_image_url.clone().unwrap();
    assert!(url.starts_with(&format!("{}/food-images/", LOCAL_STORAGE_BASE)));
    assert!(url.ends_with("-my_taco.png"));
    assert_eq!(stored[0].user_id, "U1");
    assert_eq!(h.notices.last().unwrap().message, "Successfully added food review!");
}

#[tokio::test]
async fn test_failed_upload_still_writes_record() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    h.storage.set_unavailable(true);
    let foods = h.mutations::<FoodForm>(&RecordStore::new());

    foods.submit(&mut food_form("Tacos", taco_photo())).await.unwrap();

    let stored = h.foods().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].food_image_url, None);
    assert_eq!(h.messages(NoticeLevel::Error).len(), 1);
    assert_eq!(h.messages(NoticeLevel::Success), vec!["Successfully added food review!"]);
}

#[tokio::test]
async fn test_update_keeps_unchanged_photo() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let list = RecordStore::<Food>::new();
    let foods = h.mutations::<FoodForm>(&list);

    foods.submit(&mut food_form("Tacos", taco_photo())).await.unwrap();
    let original = h.foods().await.remove(0);
    let url = original.food_image_url.clone();

    let mut form = foods.start_edit(&original);
    assert_eq!(form.preview_url(), url);
    form.values.title = "Fish tacos".into();
    foods.submit(&mut form).await.unwrap();

    let updated = h.foods().await.remove(0);
    assert_eq!(updated.title(), "Fish tacos");
    assert_eq!(updated.food_image_url, url);
    assert!(!list.is_editing());
    assert_eq!(h.notices.last().unwrap().message, "Successfully updated food review!");

    // a new file replaces the stored URL
    let mut form = foods.start_edit(&updated);
    form.values.photo = PhotoInput::New(PhotoUpload::new("fresh.jpg", vec![9]));
    foods.submit(&mut form).await.unwrap();
    let replaced = h.foods().await.remove(0).food_image_url.unwrap();
    assert!(replaced.ends_with("-fresh.jpg"));
    assert_eq!(h.storage.len(), 2);
}

#[tokio::test]
async fn test_failed_upload_on_update_keeps_photo() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let list = RecordStore::<Food>::new();
    let foods = h.mutations::<FoodForm>(&list);

    foods.submit(&mut food_form("Tacos", taco_photo())).await.unwrap();
    let original = h.foods().await.remove(0);
    assert!(original.food_image_url.is_some());

    h.storage.set_unavailable(true);
    let mut form = foods.start_edit(&original);
    form.values.title = "Fish tacos".into();
    form.values.photo = PhotoInput::New(PhotoUpload::new("fresh.jpg", vec![9]));
    foods.submit(&mut form).await.unwrap();

    let updated = h.foods().await.remove(0);
    assert_eq!(updated.title(), "Fish tacos");
    assert_eq!(updated.food_image_url, original.food_image_url);
    assert_eq!(h.messages(NoticeLevel::Error).len(), 1);
    assert_eq!(h.storage.len(), 1);
}

#[tokio::test]
async fn test_validation_blocks_network() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let foods = h.mutations::<FoodForm>(&RecordStore::new());

    let mut form = food_form("", PhotoInput::Empty);
    let err = foods.submit(&mut form).await.unwrap_err();

    assert!(matches!(err, MutationError::Validation(_)));
    assert_eq!(form.errors.get("title"), Some("Food title is required"));
    assert_eq!(form.errors.get("photo"), Some("Photo file is required"));
    assert!(h.storage.is_empty());
    assert!(h.foods().await.is_empty());
    assert!(h.notices.active().is_empty());
}

#[tokio::test]
async fn test_signed_out_create_is_rejected() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, None);
    let todos = h.mutations::<TodoForm>(&RecordStore::new());

    let mut form = FormState::<TodoForm>::new();
    form.values.title = "Buy milk".into();
    form.values.description = "2%".into();
    let err = todos.submit(&mut form).await.unwrap_err();

    assert!(matches!(err, MutationError::Unauthenticated));
    assert_eq!(h.messages(NoticeLevel::Error), vec!["You must be signed in"]);
    // values survive a failed submit
    assert_eq!(form.values.title, "Buy milk");
}

#[tokio::test]
async fn test_foreign_update_is_not_found() {
    let store = LocalStore::open_in_memory().unwrap();
    let owner = Harness::new(&store, Some("U1"));
    let intruder = Harness::new(&store, Some("U2"));

    owner
        .mutations::<FoodForm>(&RecordStore::new())
        .submit(&mut food_form("Tacos", taco_photo()))
        .await
        .unwrap();
    let food = intruder.foods().await.remove(0);

    let list = RecordStore::<Food>::new();
    let foods = intruder.mutations::<FoodForm>(&list);
    let mut form = foods.start_edit(&food);
    form.values.title = "Mine now".into();
    let err = foods.submit(&mut form).await.unwrap_err();

    assert!(matches!(err, MutationError::NotFound));
    assert_eq!(intruder.messages(NoticeLevel::Error), vec!["record not found or not yours"]);
    assert_eq!(owner.foods().await[0].title(), "Tacos");
    assert!(list.is_editing());

    let err = foods.delete(&food, &|_: &str| true).await.unwrap_err();
    assert!(matches!(err, MutationError::NotFound));
    assert_eq!(owner.foods().await.len(), 1);
}

#[tokio::test]
async fn test_declined_delete_is_cancelled() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let row: Row = json!({"title": "a", "description": "b", "user_id": "U1"})
        .as_object()
        .cloned()
        .unwrap();
    h.backend.insert(Table::Todos, row).await.unwrap();
    let todo = h.read::<Todo>(ReadSource::Table(Table::Todos)).await.remove(0);

    let todos = h.mutations::<TodoForm>(&RecordStore::new());
    let confirm = |prompt: &str| {
        assert_eq!(prompt, "Are you sure you want to delete this todo?");
        false
    };
    let err = todos.delete(&todo, &confirm).await.unwrap_err();

    assert!(matches!(err, MutationError::Cancelled));
    assert_eq!(h.read::<Todo>(ReadSource::Table(Table::Todos)).await.len(), 1);
    assert!(h.notices.active().is_empty());
}

#[tokio::test]
async fn test_delete_clears_selection() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let list = RecordStore::<GoogleDriveFile>::new();
    let drive = h.mutations::<DriveForm>(&list);

    let mut form = FormState::<DriveForm>::new();
    form.values.title = "Beach".into();
    form.values.photo = PhotoInput::New(PhotoUpload::new("beach day.jpg", vec![7]));
    drive.submit(&mut form).await.unwrap();
    assert_eq!(h.notices.last().unwrap().message, "Successfully added photo!");

    let file = h
        .read::<GoogleDriveFile>(ReadSource::Table(Table::GoogleDrives))
        .await
        .remove(0);
    assert!(file
        .google_drive_photo_url
        .as_deref()
        .unwrap()
        .contains("/google-drive-images/"));

    let _form = drive.start_edit(&file);
    assert!(list.is_editing());
    drive.delete(&file, &|_: &str| true).await.unwrap();

    assert!(!list.is_editing());
    assert_eq!(h.notices.last().unwrap().message, "Photo upload record deleted.");
    assert!(h
        .read::<GoogleDriveFile>(ReadSource::Table(Table::GoogleDrives))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_cancel_edit_returns_to_create_mode() {
    let store = LocalStore::open_in_memory().unwrap();
    let h = Harness::new(&store, Some("U1"));
    let list = RecordStore::<crate::domain::MarkdownNote>::new();
    let notes = h.mutations::<NoteForm>(&list);

    let mut form = FormState::<NoteForm>::new();
    form.values.content = "# Groceries\n\n- [ ] milk".into();
    notes.submit(&mut form).await.unwrap();
    assert_eq!(h.notices.last().unwrap().message, "Successfully added note!");

    let note = h
        .read::<crate::domain::MarkdownNote>(ReadSource::Table(Table::MarkdownNotes))
        .await
        .remove(0);
    assert_eq!(note.description, "# Groceries\n\n- [ ] milk");

    let mut form = notes.start_edit(&note);
    assert_eq!(form.values.content, note.description);
    notes.cancel_edit(&mut form);
    assert!(!list.is_editing());
    assert_eq!(form.values, NoteForm::default());
}
