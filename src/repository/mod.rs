//! Repository Layer
//!
//! Backend abstractions and their two implementations.

mod change;
mod error;
mod query;
mod traits;

pub mod hosted;
pub mod local;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub use change::{ChangeEvent, ChangeKind, ChangeSubscription, SubscriptionGuard};
pub use error::{BackendError, BackendResult};
pub use query::{Filter, ListQuery, Order, RowScope};
pub use traits::{decode_row, decode_rows, ChangeFeed, ObjectStorage, RecordBackend};

/// Characters left as-is in object keys and query values
const KEY_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode an object key for use in a URL path
pub fn encode_object_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_SAFE).to_string()
}
