//! Query Controller
//!
//! Search text and sort state for one list, published on a watch channel.
//! The owning list controller re-fetches on every change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::{Entity, ReadSource, OWNER_COLUMN};
use crate::repository::ListQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::CreatedAt => "created_at",
        }
    }

    /// Order applied when switching to this field
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortField::Title => SortOrder::Asc,
            SortField::CreatedAt => SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn flipped(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Asc)
    }
}

/// Where and how one domain's list is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListSpec {
    pub source: ReadSource,
    /// Restrict reads to the signed-in user's rows
    pub owner_scoped: bool,
    pub search_column: &'static str,
    pub sorts_by_title: bool,
}

impl ListSpec {
    pub fn for_entity<T: Entity>() -> Self {
        Self {
            source: T::SOURCE,
            owner_scoped: T::TABLE.is_owner_private(),
            search_column: T::SEARCH_COLUMN,
            sorts_by_title: T::SORTS_BY_TITLE,
        }
    }

    pub fn sorts_by(&self, field: SortField) -> bool {
        match field {
            SortField::Title => self.sorts_by_title,
            SortField::CreatedAt => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub search: String,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_field: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

impl QueryParams {
    /// Same field flips the order; another field switches with its default order
    pub fn toggled(&self, field: SortField) -> Self {
        let sort_order = if self.sort_field == field {
            self.sort_order.flipped()
        } else {
            field.default_order()
        };
        Self {
            search: self.search.clone(),
            sort_field: field,
            sort_order,
        }
    }

    /// Backend read for these params; `None` when an owner-scoped list has no owner
    pub fn to_list_query(&self, spec: &ListSpec, owner: Option<&str>) -> Option<ListQuery> {
        let mut query = ListQuery::from_source(spec.source);
        if spec.owner_scoped {
            query = query.eq(OWNER_COLUMN, owner?);
        }
        let search = self.search.trim();
        if !search.is_empty() {
            query = query.ilike(spec.search_column, search);
        }
        Some(query.order_by(self.sort_field.column(), self.sort_order.is_ascending()))
    }
}

#[derive(Clone)]
pub struct QueryController {
    params: Arc<watch::Sender<QueryParams>>,
    spec: ListSpec,
}

impl QueryController {
    pub fn new(spec: ListSpec) -> Self {
        let (tx, _rx) = watch::channel(QueryParams::default());
        Self {
            params: Arc::new(tx),
            spec,
        }
    }

    pub fn for_entity<T: Entity>() -> Self {
        Self::new(ListSpec::for_entity::<T>())
    }

    pub fn spec(&self) -> &ListSpec {
        &self.spec
    }

    pub fn params(&self) -> QueryParams {
        self.params.borrow().clone()
    }

    pub fn set_search(&self, text: &str) {
        self.params.send_if_modified(|params| {
            if params.search == text {
                return false;
            }
            params.search = text.to_string();
            true
        });
    }

    /// Fields the source has no column for are ignored
    pub fn toggle_sort(&self, field: SortField) {
        if !self.spec.sorts_by(field) {
            tracing::debug!("{} cannot be sorted by {:?}", self.spec.source.as_str(), field);
            return;
        }
        self.params.send_modify(|params| *params = params.toggled(field));
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryParams> {
        self.params.subscribe()
    }
}
