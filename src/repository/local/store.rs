//! Local Record Store
//!
//! SQL access to the embedded database and the change broadcast that
//! stands in for the hosted realtime service. Access policy lives one
//! layer up in `LocalBackend`; this type executes whatever it is asked.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base64::Engine;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::db;
use crate::domain::{ReadSource, Row, Table, UserId, OWNER_COLUMN};
use crate::repository::change::{ChangeEvent, ChangeKind, ChangeSubscription};
use crate::repository::error::{BackendError, BackendResult};
use crate::repository::query::{Filter, Order};

struct Subscriber {
    table: Table,
    /// Viewer of the subscription; private-table events go to the owner only
    viewer: Option<UserId>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        if self.table != event.table {
            return false;
        }
        if !event.table.is_owner_private() {
            return true;
        }
        match (&self.viewer, event.column(OWNER_COLUMN)) {
            (Some(viewer), Some(owner)) => viewer == owner,
            _ => false,
        }
    }
}

type Subscribers = Arc<parking_lot::Mutex<HashMap<u64, Subscriber>>>;

/// Embedded database shared by every backend handle
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    subscribers: Subscribers,
    next_subscriber: Arc<AtomicU64>,
}

impl LocalStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            subscribers: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            next_subscriber: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn open(path: &Path) -> BackendResult<Self> {
        Ok(Self::new(db::open_db(path)?))
    }

    pub fn open_in_memory() -> BackendResult<Self> {
        Ok(Self::new(db::open_in_memory()?))
    }

    pub async fn select_rows(
        &self,
        source: ReadSource,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> BackendResult<Vec<Row>> {
        let mut clause = WhereClause::default();
        for filter in filters {
            check_column(source, filter.column())?;
            match filter {
                Filter::Eq { column, value } => clause.eq(column, value),
                Filter::ILike { column, needle } => clause.ilike(column, needle),
            }
        }

        let mut sql = format!("SELECT * FROM {}{}", source.as_str(), clause.sql());
        if let Some(order) = order {
            check_column(source, &order.column)?;
            sql.push_str(&format!(
                " ORDER BY {} {}",
                order.column,
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }

        let conn = self.conn.lock().await;
        query_rows(&conn, &sql, &clause.params)
    }

    /// Insert a row, filling `id` and `created_at` when absent
    pub async fn insert_row(&self, table: Table, mut row: Row) -> BackendResult<Row> {
        for column in row.keys() {
            check_writable(table, column)?;
        }
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at")
            .or_insert_with(|| Value::String(timestamp_now()));

        let id = row_id(&row)?;
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        let stored = {
            let conn = self.conn.lock().await;
            conn.execute(&sql, params_from_iter(row.values().map(sql_value)))?;
            fetch_by_id(&conn, table, &id)?
                .ok_or_else(|| BackendError::Database(format!("inserted row {} not found", id)))?
        };

        tracing::debug!("local insert into {} ({})", table, id);
        self.broadcast(ChangeEvent::new(ChangeKind::Insert, table, Some(stored.clone()), None));
        Ok(stored)
    }

    /// Patch every row matching all `conditions`
    pub async fn update_rows(
        &self,
        table: Table,
        conditions: &[(String, String)],
        mut patch: Row,
    ) -> BackendResult<u64> {
        patch.remove("id");
        for column in patch.keys() {
            check_writable(table, column)?;
        }
        let clause = WhereClause::from_conditions(table, conditions)?;

        let events = {
            let conn = self.conn.lock().await;
            let matched = query_rows(
                &conn,
                &format!("SELECT * FROM {}{}", table, clause.sql()),
                &clause.params,
            )?;
            if patch.is_empty() {
                return Ok(matched.len() as u64);
            }

            let assignments: Vec<String> = patch.keys().map(|c| format!("{} = ?", c)).collect();
            let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments.join(", "));

            let mut events = Vec::with_capacity(matched.len());
            for old in matched {
                let id = row_id(&old)?;
                let mut params: Vec<SqlValue> = patch.values().map(sql_value).collect();
                params.push(SqlValue::Text(id.clone()));
                conn.execute(&sql, params_from_iter(params))?;

                let new = fetch_by_id(&conn, table, &id)?;
                events.push(ChangeEvent::new(ChangeKind::Update, table, new, Some(old)));
            }
            events
        };

        let count = events.len() as u64;
        tracing::debug!("local update on {} touched {} row(s)", table, count);
        for event in events {
            self.broadcast(event);
        }
        Ok(count)
    }

    /// Delete every row matching all `conditions`, cascading to reviews
    pub async fn delete_rows(
        &self,
        table: Table,
        conditions: &[(String, String)],
    ) -> BackendResult<u64> {
        let clause = WhereClause::from_conditions(table, conditions)?;

        let (count, events) = {
            let conn = self.conn.lock().await;
            let matched = query_rows(
                &conn,
                &format!("SELECT * FROM {}{}", table, clause.sql()),
                &clause.params,
            )?;

            let mut events = Vec::new();
            for old in &matched {
                let id = row_id(old)?;
                for (child, column) in db::cascading_children(table) {
                    let children = query_rows(
                        &conn,
                        &format!("SELECT * FROM {} WHERE {} = ?", child, column),
                        &[SqlValue::Text(id.clone())],
                    )?;
                    events.extend(children.into_iter().map(|row| {
                        ChangeEvent::new(ChangeKind::Delete, *child, None, Some(row))
                    }));
                }
                conn.execute(&format!("DELETE FROM {} WHERE id = ?", table), [&id])?;
                events.push(ChangeEvent::new(ChangeKind::Delete, table, None, Some(old.clone())));
            }
            (matched.len() as u64, events)
        };

        tracing::debug!("local delete on {} removed {} row(s)", table, count);
        for event in events {
            self.broadcast(event);
        }
        Ok(count)
    }

    /// Open a change subscription for `table` as seen by `viewer`
    pub fn subscribe(&self, table: Table, viewer: Option<UserId>) -> ChangeSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .insert(id, Subscriber { table, viewer, tx });
        tracing::debug!("local subscription {} opened on {}", id, table);

        let subscribers = self.subscribers.clone();
        ChangeSubscription::new(table, rx).on_release(move || {
            subscribers.lock().remove(&id);
            tracing::debug!("local subscription {} released", id);
        })
    }

    /// Live subscriptions on `table`
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.subscribers
            .lock()
            .values()
            .filter(|s| s.table == table)
            .count()
    }

    fn broadcast(&self, event: ChangeEvent) {
        self.subscribers
            .lock()
            .retain(|_, sub| !sub.wants(&event) || sub.tx.send(event.clone()).is_ok());
    }
}

#[derive(Default)]
struct WhereClause {
    terms: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereClause {
    fn from_conditions(table: Table, conditions: &[(String, String)]) -> BackendResult<Self> {
        let mut clause = Self::default();
        for (column, value) in conditions {
            check_column(ReadSource::Table(table), column)?;
            clause.eq(column, value);
        }
        Ok(clause)
    }

    fn eq(&mut self, column: &str, value: &str) {
        self.terms.push(format!("{} = ?", column));
        self.params.push(SqlValue::Text(value.to_string()));
    }

    /// Case-insensitive substring match: the column goes through `fold`, the needle is lowercased here
    fn ilike(&mut self, column: &str, needle: &str) {
        self.terms.push(format!("fold({}) LIKE ? ESCAPE '\\'", column));
        self.params
            .push(SqlValue::Text(format!("%{}%", escape_like(&needle.to_lowercase()))));
    }

    fn sql(&self) -> String {
        if self.terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.terms.join(" AND "))
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn check_column(source: ReadSource, column: &str) -> BackendResult<()> {
    if db::is_readable_column(source, column) {
        Ok(())
    } else {
        Err(unknown_column(source.as_str(), column))
    }
}

fn check_writable(table: Table, column: &str) -> BackendResult<()> {
    if db::table_columns(table).contains(&column) {
        Ok(())
    } else {
        Err(unknown_column(table.as_str(), column))
    }
}

fn unknown_column(relation: &str, column: &str) -> BackendError {
    BackendError::Status {
        status: 400,
        message: format!("column {}.{} does not exist", relation, column),
    }
}

fn row_id(row: &Row) -> BackendResult<String> {
    row.get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::Database("row has no text id".to_string()))
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fetch_by_id(conn: &Connection, table: Table, id: &str) -> BackendResult<Option<Row>> {
    let mut rows = query_rows(
        conn,
        &format!("SELECT * FROM {} WHERE id = ?", table),
        &[SqlValue::Text(id.to_string())],
    )?;
    Ok(rows.pop())
}

fn query_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> BackendResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), json_value(row.get_ref(i)?));
        }
        out.push(record);
    }
    Ok(out)
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
