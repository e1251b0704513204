//! Google Drive File Entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{Entity, Table};

/// An uploaded photo with a user-chosen name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleDriveFile {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub google_drive_photo_url: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for GoogleDriveFile {
    const TABLE: Table = Table::GoogleDrives;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }
}
