//! Domain Layer
//!
//! Entities mirrored from the hosted store and the table/bucket names
//! they live under. No I/O here.

mod entity;
mod todo;
mod food;
mod pokemon;
mod drive_file;
mod markdown_note;

pub use entity::{Bucket, ChildRecord, Entity, ReadSource, RecordId, Row, Table, UserId, OWNER_COLUMN};
pub use todo::{Priority, Todo};
pub use food::{Food, FoodReview};
pub use pokemon::{Pokemon, PokemonReview};
pub use drive_file::GoogleDriveFile;
pub use markdown_note::MarkdownNote;
