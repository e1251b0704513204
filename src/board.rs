//! Board
//!
//! The five lists with their mutations and the two review panels, wired
//! to one backend, change feed, object storage and session.

use std::sync::Arc;

use crate::commands::{DriveForm, EntityMutations, FoodForm, NoteForm, PokemonForm, TodoForm};
use crate::components::{
    drive_empty_state, drive_slots, food_empty_state, food_slots, note_empty_state, note_slots,
    pokemon_empty_state, pokemon_slots, render_card_list, todo_empty_state, todo_slots,
    CardListProps, CardListView, CardSlots, EmptyState,
};
use crate::domain::{
    Entity, Food, FoodReview, GoogleDriveFile, MarkdownNote, Pokemon, PokemonReview, Todo,
};
use crate::notice::NoticeBoard;
use crate::repository::{ChangeFeed, ObjectStorage, RecordBackend};
use crate::session::SessionProvider;
use crate::sync::{ListController, ReviewsController};

pub struct Board {
    pub session: Arc<dyn SessionProvider>,
    pub notices: NoticeBoard,

    pub todos: ListController<Todo>,
    pub foods: ListController<Food>,
    pub pokemon: ListController<Pokemon>,
    pub drive: ListController<GoogleDriveFile>,
    pub notes: ListController<MarkdownNote>,

    pub food_reviews: ReviewsController<FoodReview>,
    pub pokemon_reviews: ReviewsController<PokemonReview>,

    pub todo_cmd: EntityMutations<TodoForm>,
    pub food_cmd: EntityMutations<FoodForm>,
    pub pokemon_cmd: EntityMutations<PokemonForm>,
    pub drive_cmd: EntityMutations<DriveForm>,
    pub note_cmd: EntityMutations<NoteForm>,
}

impl Board {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        feed: Arc<dyn ChangeFeed>,
        storage: Arc<dyn ObjectStorage>,
        session: Arc<dyn SessionProvider>,
        notices: NoticeBoard,
    ) -> Self {
        let wiring = Wiring {
            backend: &backend,
            feed: &feed,
            storage: &storage,
            session: &session,
            notices: &notices,
        };
        let todos = wiring.list::<Todo>();
        let foods = wiring.list::<Food>();
        let pokemon = wiring.list::<Pokemon>();
        let drive = wiring.list::<GoogleDriveFile>();
        let notes = wiring.list::<MarkdownNote>();

        let food_reviews =
            ReviewsController::new(backend.clone(), feed.clone(), session.clone(), notices.clone());
        let pokemon_reviews =
            ReviewsController::new(backend.clone(), feed.clone(), session.clone(), notices.clone());

        let todo_cmd = wiring.build::<TodoForm>(&todos);
        let food_cmd = wiring
            .build::<FoodForm>(&foods)
            .with_child_purge(food_reviews.purger());
        let pokemon_cmd = wiring
            .build::<PokemonForm>(&pokemon)
            .with_child_purge(pokemon_reviews.purger());
        let drive_cmd = wiring.build::<DriveForm>(&drive);
        let note_cmd = wiring.build::<NoteForm>(&notes);

        Self {
            session,
            notices,
            todos,
            foods,
            pokemon,
            drive,
            notes,
            food_reviews,
            pokemon_reviews,
            todo_cmd,
            food_cmd,
            pokemon_cmd,
            drive_cmd,
            note_cmd,
        }
    }

    pub fn mount(&self) {
        self.todos.mount();
        self.foods.mount();
        self.pokemon.mount();
        self.drive.mount();
        self.notes.mount();
        self.food_reviews.mount();
        self.pokemon_reviews.mount();
    }

    pub fn unmount(&self) {
        self.food_reviews.unmount();
        self.pokemon_reviews.unmount();
        self.todos.unmount();
        self.foods.unmount();
        self.pokemon.unmount();
        self.drive.unmount();
        self.notes.unmount();
    }

    pub fn todo_view(&self) -> CardListView {
        let slots = todo_slots(selected_id(&self.todos));
        self.view(&self.todos, &todo_empty_state(), &slots, "todo-list")
    }

    pub fn food_view(&self) -> CardListView {
        let slots = food_slots(selected_id(&self.foods), self.food_reviews.snapshot());
        self.view(&self.foods, &food_empty_state(), &slots, "food-list")
    }

    pub fn pokemon_view(&self) -> CardListView {
        let slots = pokemon_slots(selected_id(&self.pokemon), self.pokemon_reviews.snapshot());
        self.view(&self.pokemon, &pokemon_empty_state(), &slots, "pokemon-list")
    }

    pub fn drive_view(&self) -> CardListView {
        let slots = drive_slots(selected_id(&self.drive));
        self.view(&self.drive, &drive_empty_state(), &slots, "drive-list")
    }

    pub fn note_view(&self) -> CardListView {
        let slots = note_slots(selected_id(&self.notes));
        self.view(&self.notes, &note_empty_state(), &slots, "note-list")
    }

    /// Markup of every list, in tab order
    pub fn to_html(&self) -> String {
        [
            self.todo_view(),
            self.food_view(),
            self.pokemon_view(),
            self.drive_view(),
            self.note_view(),
        ]
        .iter()
        .map(CardListView::to_html)
        .collect()
    }

    fn view<T: Entity>(
        &self,
        list: &ListController<T>,
        empty_state: &EmptyState,
        slots: &CardSlots<T>,
        class_name: &str,
    ) -> CardListView {
        let items = list.store().items();
        let user = self.session.user_id();
        render_card_list(&CardListProps {
            items: &items,
            is_loading: list.is_loading(),
            empty_state,
            slots,
            current_user_id: user.as_deref(),
            class_name: Some(class_name),
        })
    }
}

fn selected_id<T: Entity>(list: &ListController<T>) -> Option<String> {
    list.store().selected().map(|item| item.id().to_string())
}

struct Wiring<'a> {
    backend: &'a Arc<dyn RecordBackend>,
    feed: &'a Arc<dyn ChangeFeed>,
    storage: &'a Arc<dyn ObjectStorage>,
    session: &'a Arc<dyn SessionProvider>,
    notices: &'a NoticeBoard,
}

impl Wiring<'_> {
    fn list<T: Entity>(&self) -> ListController<T> {
        ListController::new(
            self.backend.clone(),
            self.feed.clone(),
            self.session.clone(),
            self.notices.clone(),
        )
    }

    fn build<F: crate::commands::EntityForm>(
        &self,
        list: &ListController<F::Record>,
    ) -> EntityMutations<F> {
        EntityMutations::new(
            self.backend.clone(),
            self.storage.clone(),
            self.session.clone(),
            self.notices.clone(),
            list.store().clone(),
        )
    }
}
