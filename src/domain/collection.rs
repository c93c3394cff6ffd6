use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_db::RecordId;

use super::validation::{Checks, FieldError};

/// Title and description of the collection every new database starts with.
pub const DEFAULT_COLLECTION_TITLE: &str = "My Books";
pub const DEFAULT_COLLECTION_DESCRIPTION: &str = "Default collection for all books";

/// A named grouping of books within one tenant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    /// Whether this collection's title collides with `title`
    pub fn has_title(&self, title: &str) -> bool {
        title_key(&self.title) == title_key(title)
    }
}

/// Uniqueness key for collection titles: trimmed and lowercased.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionRecord<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Collection> for CollectionRecord<'a> {
    fn from(collection: &'a Collection) -> Self {
        Self {
            title: &collection.title,
            description: &collection.description,
            created_at: collection.created_at,
            updated_at: collection.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCollection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl NewCollection {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    pub(crate) fn check(self) -> Result<Self, Vec<FieldError>> {
        let mut checks = Checks::default();
        let title = checks.required("title", &self.title);
        checks.finish()?;
        Ok(Self {
            title,
            description: self.description.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl CollectionPatch {
    pub(crate) fn check(self) -> Result<Self, Vec<FieldError>> {
        let mut checks = Checks::default();
        let title = self.title.map(|t| checks.required("title", &t));
        checks.finish()?;
        Ok(Self {
            title,
            description: self.description.map(|d| d.trim().to_string()),
        })
    }

    pub(crate) fn apply_to(self, collection: &mut Collection) {
        if let Some(title) = self.title {
            collection.title = title;
        }
        if let Some(description) = self.description {
            collection.description = description;
        }
    }
}
