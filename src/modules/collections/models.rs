use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Collection;

/// Collection as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Collection> for CollectionView {
    fn from(collection: Collection) -> Self {
        Self {
            id: collection.id.to_string(),
            title: collection.title,
            description: collection.description,
            created_at: collection.created_at,
            updated_at: collection.updated_at,
        }
    }
}
