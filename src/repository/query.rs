//! Backend Query Shapes
//!
//! Backend-neutral description of a list read and of the row scope a
//! write applies to. The hosted client turns these into REST query
//! parameters, the local store into SQL.

use crate::domain::{ReadSource, Table, OWNER_COLUMN};

/// Row predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `column = value`
    Eq { column: String, value: String },
    /// Case-insensitive substring match of `needle` in `column`
    ILike { column: String, needle: String },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. } | Filter::ILike { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// One filtered, ordered read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub source: ReadSource,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl ListQuery {
    pub fn from_source(source: ReadSource) -> Self {
        Self {
            source,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn from_table(table: Table) -> Self {
        Self::from_source(ReadSource::Table(table))
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn ilike(mut self, column: &str, needle: &str) -> Self {
        self.filters.push(Filter::ILike {
            column: column.to_string(),
            needle: needle.to_string(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Value of the owner equality filter, if any
    pub fn owner_filter(&self) -> Option<&str> {
        self.filters.iter().find_map(|f| match f {
            Filter::Eq { column, value } if column == OWNER_COLUMN => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Equality scope of an update or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScope {
    pub conditions: Vec<(String, String)>,
}

impl RowScope {
    pub fn by_id(id: &str) -> Self {
        Self {
            conditions: vec![("id".to_string(), id.to_string())],
        }
    }

    pub fn owned_by(mut self, user_id: &str) -> Self {
        self.conditions.push((OWNER_COLUMN.to_string(), user_id.to_string()));
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.conditions
            .iter()
            .find(|(column, _)| column == "id")
            .map(|(_, value)| value.as_str())
    }
}
