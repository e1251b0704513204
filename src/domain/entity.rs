//! Domain Layer - Core Entity Trait
//!
//! Every list on the board is a table of flat records. `Entity` ties a
//! record type to its table, the source it is listed from and the column
//! free-text search runs against.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Record identifiers are backend-generated UUID strings
pub type RecordId = String;
/// Identity of the signed-in user (the owner of a record)
pub type UserId = String;
/// One row as exchanged with the backend
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Column stamped with the owner id on every owned table
pub const OWNER_COLUMN: &str = "user_id";

/// Tables of the relational store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Todos,
    Foods,
    FoodReviews,
    Pokemons,
    PokemonReviews,
    GoogleDrives,
    MarkdownNotes,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Todos,
        Table::Foods,
        Table::FoodReviews,
        Table::Pokemons,
        Table::PokemonReviews,
        Table::GoogleDrives,
        Table::MarkdownNotes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Todos => "todos",
            Table::Foods => "foods",
            Table::FoodReviews => "food_reviews",
            Table::Pokemons => "pokemons",
            Table::PokemonReviews => "pokemon_reviews",
            Table::GoogleDrives => "google_drives",
            Table::MarkdownNotes => "markdown_notes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Table::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Rows readable by their owner only
    pub fn is_owner_private(&self) -> bool {
        matches!(self, Table::Todos | Table::GoogleDrives | Table::MarkdownNotes)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a list is read from: a table or a read-only aggregate view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    Table(Table),
    /// `foods` plus a `reviewcount` column
    FoodsWithReviewCount,
    /// `pokemons` plus a `reviewcount` column
    PokemonsWithReviewCount,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadSource::Table(table) => table.as_str(),
            ReadSource::FoodsWithReviewCount => "foods_with_review_count",
            ReadSource::PokemonsWithReviewCount => "pokemons_with_review_count",
        }
    }

    /// Table whose rows (and access policy) the source exposes
    pub fn base_table(&self) -> Table {
        match self {
            ReadSource::Table(table) => *table,
            ReadSource::FoodsWithReviewCount => Table::Foods,
            ReadSource::PokemonsWithReviewCount => Table::Pokemons,
        }
    }
}

/// Object storage buckets, one per photo feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    FoodImages,
    PokemonImages,
    GoogleDriveImages,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::FoodImages => "food-images",
            Bucket::PokemonImages => "pokemon-images",
            Bucket::GoogleDriveImages => "google-drive-images",
        }
    }
}

/// Core trait for all listed records
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table inserts, updates and deletes go to
    const TABLE: Table;
    /// Source the list is fetched from
    const SOURCE: ReadSource = ReadSource::Table(Self::TABLE);
    /// Column matched by the search box
    const SEARCH_COLUMN: &'static str = "title";
    /// Whether the source has a `title` column to order by
    const SORTS_BY_TITLE: bool = true;

    fn id(&self) -> &str;

    fn owner_id(&self) -> Option<&str>;

    fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        match (self.owner_id(), user_id) {
            (Some(owner), Some(user)) => owner == user,
            _ => false,
        }
    }
}

/// A review attached to a parent record
pub trait ChildRecord: Entity {
    /// Foreign-key column naming the parent
    const PARENT_COLUMN: &'static str;

    fn parent_id(&self) -> &str;

    fn comment(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    /// Insert payload for a new review by `user_id`
    fn new_row(parent_id: &str, user_id: &str, comment: &str) -> Row {
        let mut row = Row::new();
        row.insert(Self::PARENT_COLUMN.to_string(), parent_id.into());
        row.insert(OWNER_COLUMN.to_string(), user_id.into());
        row.insert("comment".to_string(), comment.into());
        row
    }

    /// Parent id carried by a raw change-event row
    fn parent_of(row: &Row) -> Option<&str> {
        row.get(Self::PARENT_COLUMN).and_then(|v| v.as_str())
    }
}
