//! Repository Layer - Core Traits
//!
//! The hosted platform is three black boxes: a relational store, an object
//! store and a change feed. Implementations: `local` (embedded SQLite) and
//! `hosted` (REST + websocket).

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::change::ChangeSubscription;
use super::error::BackendResult;
use super::query::{ListQuery, RowScope};
use crate::domain::{Bucket, Row, Table};

/// Row-level CRUD against the relational store
///
/// Access scoping (owner-only reads and writes) is the backend's job; the
/// caller passes owner filters for intent, not for security.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Filtered, ordered read of a table or view
    async fn select(&self, query: &ListQuery) -> BackendResult<Vec<Row>>;

    /// Insert one row, returning it as stored
    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row>;

    /// Patch every row in scope, returning how many changed
    async fn update(&self, table: Table, scope: &RowScope, patch: Row) -> BackendResult<u64>;

    /// Delete every row in scope, returning how many were removed
    async fn delete(&self, table: Table, scope: &RowScope) -> BackendResult<u64>;
}

/// Binary uploads addressed by bucket and key
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()>;

    /// Publicly resolvable URL of an object
    fn public_url(&self, bucket: Bucket, key: &str) -> String;
}

/// Per-table push subscriptions
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: Table) -> BackendResult<ChangeSubscription>;
}

/// Decode one backend row into a typed record
pub fn decode_row<T: DeserializeOwned>(row: Row) -> BackendResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(row))?)
}

/// Decode a full result set, failing on the first bad row
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}
