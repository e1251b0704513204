//! Per-domain form values and their validation rules

use serde_json::Value;

use super::form::{EntityForm, PhotoInput, ValidationErrors};
use crate::domain::{Bucket, Food, GoogleDriveFile, MarkdownNote, Pokemon, Priority, Row, Todo};

const TITLE_MAX: usize = 128;
const TODO_DESCRIPTION_MAX: usize = 800;
const NOTE_CONTENT_MAX: usize = 8000;
const REVIEW_COMMENT_MAX: usize = 2048;

fn text(value: &str) -> Value {
    Value::String(value.trim().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoForm {
    pub title: String,
    pub description: String,
    pub priority: Option<Priority>,
}

impl EntityForm for TodoForm {
    type Record = Todo;

    const NOUN: &'static str = "todo";
    const DELETE_PROMPT: &'static str = "Are you sure you want to delete this todo?";
    const DELETED_MESSAGE: &'static str = "Todo deleted successfully";

    fn from_record(record: &Todo) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description().to_string(),
            priority: record.priority_level,
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("title", &self.title, "Title is required", Some(TITLE_MAX));
        errors.check_text(
            "description",
            &self.description,
            "Description is required",
            Some(TODO_DESCRIPTION_MAX),
        );
        errors.into_result()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), text(&self.title));
        row.insert("description".into(), text(&self.description));
        row.insert(
            "priority_levels".into(),
            self.priority
                .map(|p| Value::String(p.as_str().to_string()))
                .unwrap_or(Value::Null),
        );
        row
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodForm {
    pub title: String,
    pub description: String,
    pub photo: PhotoInput,
}

impl EntityForm for FoodForm {
    type Record = Food;

    const PHOTO: Option<(Bucket, &'static str)> = Some((Bucket::FoodImages, "food_image_url"));
    const NOUN: &'static str = "food review";
    const DELETE_PROMPT: &'static str =
        "Are you sure you want to delete this food entry? This will also delete all associated reviews.";
    const DELETED_MESSAGE: &'static str = "Food entry deleted.";

    fn from_record(record: &Food) -> Self {
        Self {
            title: record.title().to_string(),
            description: record.description().to_string(),
            photo: PhotoInput::from_url(record.food_image_url.as_deref()),
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("title", &self.title, "Food title is required", None);
        errors.check_text(
            "description",
            &self.description,
            "Food description is required",
            Some(TITLE_MAX),
        );
        errors.check_photo("photo", &self.photo);
        errors.into_result()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), text(&self.title));
        row.insert("description".into(), text(&self.description));
        row
    }

    fn photo(&self) -> &PhotoInput {
        &self.photo
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PokemonForm {
    pub title: String,
    pub description: String,
    pub photo: PhotoInput,
}

impl EntityForm for PokemonForm {
    type Record = Pokemon;

    const PHOTO: Option<(Bucket, &'static str)> =
        Some((Bucket::PokemonImages, "pokemon_image_url"));
    const NOUN: &'static str = "pokemon";
    const DELETE_PROMPT: &'static str =
        "Are you sure you want to delete this Pokémon entry? This will also delete all associated reviews.";
    const DELETED_MESSAGE: &'static str = "Pokémon entry deleted.";

    fn from_record(record: &Pokemon) -> Self {
        Self {
            title: record.title().to_string(),
            description: record.description.clone(),
            photo: PhotoInput::from_url(record.pokemon_image_url.as_deref()),
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("title", &self.title, "Pokemon title is required", None);
        errors.check_text(
            "description",
            &self.description,
            "Pokemon description is required",
            Some(TITLE_MAX),
        );
        errors.check_photo("photo", &self.photo);
        errors.into_result()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), text(&self.title));
        row.insert("description".into(), text(&self.description));
        row
    }

    fn photo(&self) -> &PhotoInput {
        &self.photo
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveForm {
    /// Display name of the photo
    pub title: String,
    pub photo: PhotoInput,
}

impl EntityForm for DriveForm {
    type Record = GoogleDriveFile;

    const PHOTO: Option<(Bucket, &'static str)> =
        Some((Bucket::GoogleDriveImages, "google_drive_photo_url"));
    const NOUN: &'static str = "photo";
    const DELETE_PROMPT: &'static str = "Are you sure you want to delete this photo from the list? \
        (You will not delete the file on Google Drive, only the record.)";
    const DELETED_MESSAGE: &'static str = "Photo upload record deleted.";

    fn from_record(record: &GoogleDriveFile) -> Self {
        Self {
            title: record.title.clone(),
            photo: PhotoInput::from_url(record.google_drive_photo_url.as_deref()),
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("title", &self.title, "Photo name is required", Some(TITLE_MAX));
        errors.check_photo("photo", &self.photo);
        errors.into_result()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), text(&self.title));
        row
    }

    fn photo(&self) -> &PhotoInput {
        &self.photo
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteForm {
    /// Markdown source, stored verbatim
    pub content: String,
}

impl EntityForm for NoteForm {
    type Record = MarkdownNote;

    const NOUN: &'static str = "note";
    const DELETE_PROMPT: &'static str = "Are you sure you want to delete this note?";
    const DELETED_MESSAGE: &'static str = "Note deleted successfully";

    fn from_record(record: &MarkdownNote) -> Self {
        Self {
            content: record.description.clone(),
        }
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check_text("content", &self.content, "Content is required", Some(NOTE_CONTENT_MAX));
        errors.into_result()
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("description".into(), Value::String(self.content.clone()));
        row
    }
}

/// Review comment rules, shared by food and pokemon reviews
pub fn validate_comment(comment: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check_text("comment", comment, "Comment is required", Some(REVIEW_COMMENT_MAX));
    errors.into_result()
}
