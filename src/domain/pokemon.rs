//! Pokemon Entity
//!
//! Shared Pokémon catalog entries with a photo, plus per-user reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{ChildRecord, Entity, ReadSource, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    #[serde(default)]
    pub pokemon_image_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewcount: Option<i64>,
}

impl Pokemon {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

impl Entity for Pokemon {
    const TABLE: Table = Table::Pokemons;
    const SOURCE: ReadSource = ReadSource::PokemonsWithReviewCount;
    const SEARCH_COLUMN: &'static str = "description";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PokemonReview {
    pub id: String,
    pub pokemon_id: String,
    pub user_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for PokemonReview {
    const TABLE: Table = Table::PokemonReviews;
    const SEARCH_COLUMN: &'static str = "comment";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl ChildRecord for PokemonReview {
    const PARENT_COLUMN: &'static str = "pokemon_id";

    fn parent_id(&self) -> &str {
        &self.pokemon_id
    }

    fn comment(&self) -> &str {
        &self.comment
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
