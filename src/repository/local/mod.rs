//! Local Backend
//!
//! Embedded SQLite emulation of the hosted platform.

mod backend;
mod db;
mod storage;
mod store;


pub use backend::LocalBackend;
pub use db::{open_db, open_in_memory};
pub use storage::{MemoryStorage, StoredObject, LOCAL_STORAGE_BASE};
pub use store::LocalStore;
