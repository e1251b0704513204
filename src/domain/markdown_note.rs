//! Markdown Note Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{Entity, Table};

/// Markdown text kept in `description`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownNote {
    pub id: String,
    pub description: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl MarkdownNote {
    /// First non-blank line, used as the card heading
    pub fn headline(&self) -> &str {
        self.description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
    }
}

impl Entity for MarkdownNote {
    const TABLE: Table = Table::MarkdownNotes;
    const SEARCH_COLUMN: &'static str = "description";
    const SORTS_BY_TITLE: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}
