//! Mutation Commands
//!
//! Form handling and the create, update and delete commands per domain,
//! plus saving and deleting reviews. Commands write to the backend only.

mod entity_cmd;
mod form;
mod forms;
mod review_cmd;

#[cfg(test)]
mod tests;

pub use entity_cmd::EntityMutations;
pub use form::{
    Confirm, EntityForm, FormState, MutationError, PhotoInput, PhotoUpload, ValidationErrors,
};
pub use forms::{validate_comment, DriveForm, FoodForm, NoteForm, PokemonForm, TodoForm};
pub use review_cmd::{ReviewMutations, DELETE_REVIEW_PROMPT};
