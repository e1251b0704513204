//! List Synchronization
//!
//! Query state, fetching, change listening and the controllers that tie
//! them together for each list and each review panel.

mod fetcher;
mod list_controller;
mod listener;
mod query_controller;
mod reviews;

#[cfg(test)]
mod tests;

pub use fetcher::{FetchOutcome, SyncFetcher};
pub use list_controller::ListController;
pub use listener::{listen, ListenerHandle};
pub use query_controller::{ListSpec, QueryController, QueryParams, SortField, SortOrder};
pub use reviews::ReviewsController;
