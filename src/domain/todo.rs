//! Todo Entity
//!
//! Private per-user todo with an optional priority level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::entity::{Entity, Table};

/// Priority level stored in `priority_levels`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Unknown or empty values mean "no priority"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Priority::parse))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "priority_levels", default, deserialize_with = "lenient_priority")]
    pub priority_level: Option<Priority>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

impl Entity for Todo {
    const TABLE: Table = Table::Todos;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_todo_from_row() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "t1",
            "title": "Buy milk",
            "description": "2%  or whole",
            "priority_levels": "high",
            "user_id": "U1",
            "created_at": "2024-05-01T10:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(todo.id(), "t1");
        assert_eq!(todo.priority_level, Some(Priority::High));
        assert_eq!(todo.description(), "2%  or whole");
        assert!(todo.is_owned_by(Some("U1")));
        assert!(!todo.is_owned_by(Some("U2")));
        assert!(!todo.is_owned_by(None));
    }

    #[test]
    fn test_blank_priority_is_none() {
        let todo: Todo = serde_json::from_value(json!({
            "id": "t2",
            "title": "Call mom",
            "description": null,
            "priority_levels": "",
            "user_id": "U1",
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(todo.priority_level, None);
        assert_eq!(todo.description(), "");
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("Medium"), Some(Priority::Medium));
        assert_eq!(Priority::parse(""), None);
        assert_eq!(Priority::Low.as_str(), "low");
    }
}
