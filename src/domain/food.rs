//! Food Entity
//!
//! Public food entries with a photo, plus per-user reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{ChildRecord, Entity, ReadSource, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub food_image_url: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    /// Only present when read from `foods_with_review_count`
    #[serde(default)]
    pub reviewcount: Option<i64>,
}

impl Food {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

impl Entity for Food {
    const TABLE: Table = Table::Foods;
    const SOURCE: ReadSource = ReadSource::FoodsWithReviewCount;
    const SEARCH_COLUMN: &'static str = "description";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodReview {
    pub id: String,
    pub food_id: String,
    pub user_id: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for FoodReview {
    const TABLE: Table = Table::FoodReviews;
    const SEARCH_COLUMN: &'static str = "comment";

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

impl ChildRecord for FoodReview {
    const PARENT_COLUMN: &'static str = "food_id";

    fn parent_id(&self) -> &str {
        &self.food_id
    }

    fn comment(&self) -> &str {
        &self.comment
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;
    use serde_json::json;

    #[test]
    fn test_food_from_view_row() {
        let food: Food = serde_json::from_value(json!({
            "id": "f1",
            "title": "Tacos",
            "description": "Street tacos",
            "food_image_url": null,
            "user_id": "U1",
            "created_at": "2024-05-01T10:00:00Z",
            "reviewcount": 3
        }))
        .unwrap();

        assert_eq!(food.title(), "Tacos");
        assert_eq!(food.reviewcount, Some(3));
        assert!(food.food_image_url.is_none());
    }

    #[test]
    fn test_review_row_and_parent() {
        let row = FoodReview::new_row("f1", "U2", "Great");
        assert_eq!(row["food_id"], "f1");
        assert_eq!(row["user_id"], "U2");
        assert_eq!(FoodReview::parent_of(&row), Some("f1"));
        assert_eq!(FoodReview::parent_of(&Row::new()), None);
    }
}
