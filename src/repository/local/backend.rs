//! Local Backend
//!
//! `RecordBackend` and `ChangeFeed` over the embedded store, with the
//! hosted row-level policy applied against the current session:
//! private tables are readable by their owner only, and every write must
//! carry (insert) or be scoped to (update, delete) the session user.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::store::LocalStore;
use crate::domain::{Row, Table, UserId, OWNER_COLUMN};
use crate::repository::change::ChangeSubscription;
use crate::repository::error::{BackendError, BackendResult};
use crate::repository::query::{Filter, ListQuery, RowScope};
use crate::repository::traits::{ChangeFeed, RecordBackend};
use crate::session::SessionProvider;

/// One client's view of the shared local store
#[derive(Clone)]
pub struct LocalBackend {
    store: LocalStore,
    session: Arc<dyn SessionProvider>,
}

impl LocalBackend {
    pub fn new(store: LocalStore, session: Arc<dyn SessionProvider>) -> Self {
        Self { store, session }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    fn require_user(&self) -> BackendResult<UserId> {
        self.session.user_id().ok_or(BackendError::Unauthenticated)
    }

    fn owner_scope(&self, scope: &RowScope) -> BackendResult<Vec<(String, String)>> {
        let user = self.require_user()?;
        let mut conditions = scope.conditions.clone();
        conditions.push((OWNER_COLUMN.to_string(), user));
        Ok(conditions)
    }
}

fn policy_violation(table: Table) -> BackendError {
    BackendError::Policy(format!(
        "new row violates row-level security policy for table \"{}\"",
        table
    ))
}

#[async_trait]
impl RecordBackend for LocalBackend {
    async fn select(&self, query: &ListQuery) -> BackendResult<Vec<Row>> {
        let mut filters = query.filters.clone();
        if query.source.base_table().is_owner_private() {
            // Anonymous readers see no private rows
            let Some(user) = self.session.user_id() else {
                return Ok(Vec::new());
            };
            filters.push(Filter::Eq {
                column: OWNER_COLUMN.to_string(),
                value: user,
            });
        }
        self.store
            .select_rows(query.source, &filters, query.order.as_ref())
            .await
    }

    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row> {
        let user = self.require_user()?;
        if row.get(OWNER_COLUMN).and_then(Value::as_str) != Some(user.as_str()) {
            return Err(policy_violation(table));
        }
        self.store.insert_row(table, row).await
    }

    async fn update(&self, table: Table, scope: &RowScope, patch: Row) -> BackendResult<u64> {
        let conditions = self.owner_scope(scope)?;
        if let Some(owner) = patch.get(OWNER_COLUMN) {
            if owner.as_str() != self.session.user_id().as_deref() {
                return Err(policy_violation(table));
            }
        }
        self.store.update_rows(table, &conditions, patch).await
    }

    async fn delete(&self, table: Table, scope: &RowScope) -> BackendResult<u64> {
        let conditions = self.owner_scope(scope)?;
        self.store.delete_rows(table, &conditions).await
    }
}

impl ChangeFeed for LocalBackend {
    fn subscribe(&self, table: Table) -> BackendResult<ChangeSubscription> {
        Ok(self.store.subscribe(table, self.session.user_id()))
    }
}
