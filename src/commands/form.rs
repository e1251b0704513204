//! Form Values and Validation
//!
//! Headless form state: typed values per domain, per-field validation
//! messages, and the photo slot that is either empty, the record's current
//! URL, or a freshly picked file.

use std::collections::BTreeMap;

use base64::Engine;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Bucket, Entity, Row};
use crate::repository::BackendError;

/// A file picked in the form, not yet uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Explicit MIME type; guessed from the file name when absent
    pub content_type: Option<String>,
}

impl PhotoUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
            content_type: None,
        }
    }

    pub fn content_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .to_string()
        })
    }

    /// Random object key: `<uuid>-<file name with whitespace as _>`
    pub fn storage_key(&self) -> String {
        let name: String = self
            .file_name
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("{}-{}", Uuid::new_v4(), name)
    }

    /// Inline preview of the picked file
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PhotoInput {
    #[default]
    Empty,
    /// Unchanged photo of the record being edited
    Existing(String),
    New(PhotoUpload),
}

impl PhotoInput {
    pub fn from_url(url: Option<&str>) -> Self {
        match url {
            Some(url) if !url.is_empty() => PhotoInput::Existing(url.to_string()),
            _ => PhotoInput::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PhotoInput::Empty)
    }

    pub fn preview_url(&self) -> Option<String> {
        match self {
            PhotoInput::Empty => None,
            PhotoInput::Existing(url) => Some(url.clone()),
            PhotoInput::New(upload) => Some(upload.data_url()),
        }
    }
}

/// Field name -> first failing message
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid form: {0:?}")]
pub struct ValidationErrors(pub BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Keep the first message per field
    pub fn add(&mut self, field: &'static str, message: &str) {
        self.0.entry(field).or_insert_with(|| message.to_string());
    }

    /// Required, then bounded by `max` characters
    pub fn check_text(&mut self, field: &'static str, value: &str, required: &str, max: Option<usize>) {
        if value.trim().is_empty() {
            self.add(field, required);
        } else if let Some(max) = max {
            if value.chars().count() > max {
                self.add(field, &format!("Max {} characters", max));
            }
        }
    }

    pub fn check_photo(&mut self, field: &'static str, photo: &PhotoInput) {
        if photo.is_empty() {
            self.add(field, "Photo file is required");
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Values of one domain's form, convertible to a backend payload
pub trait EntityForm: Clone + Default + Send + Sync + 'static {
    type Record: Entity;

    /// Bucket for the photo column, when the form has one
    const PHOTO: Option<(Bucket, &'static str)> = None;
    /// Used in "Successfully added {noun}!"
    const NOUN: &'static str;
    const DELETE_PROMPT: &'static str;
    const DELETED_MESSAGE: &'static str;

    fn from_record(record: &Self::Record) -> Self;

    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Column values without owner or photo
    fn to_row(&self) -> Row;

    fn photo(&self) -> &PhotoInput {
        static EMPTY: PhotoInput = PhotoInput::Empty;
        &EMPTY
    }
}

/// Form values plus the messages and preview the view shows
#[derive(Debug, Clone, Default)]
pub struct FormState<F: EntityForm> {
    pub values: F,
    pub errors: ValidationErrors,
}

impl<F: EntityForm> FormState<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Form loaded with a record for editing
    pub fn editing(record: &F::Record) -> Self {
        Self {
            values: F::from_record(record),
            errors: ValidationErrors::new(),
        }
    }

    pub fn preview_url(&self) -> Option<String> {
        self.values.photo().preview_url()
    }

    /// Validate into `errors`, returning whether the form can be submitted
    pub fn validate(&mut self) -> bool {
        match self.values.validate() {
            Ok(()) => {
                self.errors = ValidationErrors::new();
                true
            }
            Err(errors) => {
                self.errors = errors;
                false
            }
        }
    }

    /// Back to defaults: values, file and preview cleared
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Interactive yes/no prompt
pub trait Confirm: Send + Sync {
    fn confirm(&self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("You must be signed in")]
    Unauthenticated,

    #[error("cancelled")]
    Cancelled,

    #[error("record not found or not yours")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
