//! Record API client (PostgREST query syntax)

use std::sync::Arc;

use async_trait::async_trait;

use super::{check_status, Endpoint};
use crate::domain::{Row, Table};
use crate::repository::error::{BackendError, BackendResult};
use crate::repository::query::{Filter, ListQuery, RowScope};
use crate::repository::traits::RecordBackend;
use crate::session::SessionProvider;

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Clone)]
pub struct RestClient {
    endpoint: Endpoint,
    session: Arc<dyn SessionProvider>,
}

impl RestClient {
    pub fn new(endpoint: Endpoint, session: Arc<dyn SessionProvider>) -> Self {
        Self { endpoint, session }
    }

    fn table_url(&self, relation: &str) -> String {
        self.endpoint.url(&format!("/rest/v1/{}", relation))
    }

    fn token(&self) -> Option<String> {
        self.session.current().and_then(|s| s.access_token)
    }

    async fn rows(response: reqwest::Response) -> BackendResult<Vec<Row>> {
        Ok(check_status(response).await?.json::<Vec<Row>>().await?)
    }
}

/// Query-string pairs for a list read
pub fn query_pairs(query: &ListQuery) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];
    for filter in &query.filters {
        let pair = match filter {
            Filter::Eq { column, value } => (column.clone(), format!("eq.{}", value)),
            Filter::ILike { column, needle } => (column.clone(), format!("ilike.*{}*", needle)),
        };
        pairs.push(pair);
    }
    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    pairs
}

fn scope_pairs(scope: &RowScope) -> Vec<(String, String)> {
    scope
        .conditions
        .iter()
        .map(|(column, value)| (column.clone(), format!("eq.{}", value)))
        .collect()
}

#[async_trait]
impl RecordBackend for RestClient {
    async fn select(&self, query: &ListQuery) -> BackendResult<Vec<Row>> {
        let token = self.token();
        let request = self
            .endpoint
            .http()
            .get(self.table_url(query.source.as_str()))
            .query(&query_pairs(query));
        let response = self.endpoint.authorize(request, token.as_deref()).send().await?;
        Self::rows(response).await
    }

    async fn insert(&self, table: Table, row: Row) -> BackendResult<Row> {
        let token = self.token();
        let request = self
            .endpoint
            .http()
            .post(self.table_url(table.as_str()))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        let response = self.endpoint.authorize(request, token.as_deref()).send().await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Decode(format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: Table, scope: &RowScope, patch: Row) -> BackendResult<u64> {
        let token = self.token();
        let request = self
            .endpoint
            .http()
            .patch(self.table_url(table.as_str()))
            .query(&scope_pairs(scope))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        let response = self.endpoint.authorize(request, token.as_deref()).send().await?;
        Ok(Self::rows(response).await?.len() as u64)
    }

    async fn delete(&self, table: Table, scope: &RowScope) -> BackendResult<u64> {
        let token = self.token();
        let request = self
            .endpoint
            .http()
            .delete(self.table_url(table.as_str()))
            .query(&scope_pairs(scope))
            .header("Prefer", RETURN_REPRESENTATION);
        let response = self.endpoint.authorize(request, token.as_deref()).send().await?;
        Ok(Self::rows(response).await?.len() as u64)
    }
}
