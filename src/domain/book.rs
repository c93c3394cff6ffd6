use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_db::RecordId;

use super::validation::{optional_text, Checks, FieldError};

/// Reading state of a book. Wire names are fixed by existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum BookStatus {
    #[default]
    #[serde(rename = "TBR")]
    Tbr,
    Reading,
    Read,
    #[serde(rename = "DNF")]
    Dnf,
    #[serde(rename = "On Hold")]
    OnHold,
}

impl BookStatus {
    pub const ALL: [BookStatus; 5] = [
        BookStatus::Tbr,
        BookStatus::Reading,
        BookStatus::Read,
        BookStatus::Dnf,
        BookStatus::OnHold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Tbr => "TBR",
            BookStatus::Reading => "Reading",
            BookStatus::Read => "Read",
            BookStatus::Dnf => "DNF",
            BookStatus::OnHold => "On Hold",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown status '{s}'; expected one of TBR, Reading, Read, DNF, On Hold"
                )
            })
    }
}

/// A book owned by one tenant.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: RecordId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub review: Option<String>,
    pub rating: u8,
    pub status: BookStatus,
    pub collection_id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored shape of a book: everything but the store-owned identifier.
/// `review` is written as `null` when absent so an update can clear it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookRecord<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub review: Option<&'a str>,
    pub rating: u8,
    pub status: BookStatus,
    pub collection_id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Book> for BookRecord<'a> {
    fn from(book: &'a Book) -> Self {
        Self {
            title: &book.title,
            author: &book.author,
            review: book.review.as_deref(),
            rating: book.rating,
            status: book.status,
            collection_id: book.collection_id,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// Input for creating a book.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewBook {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default)]
    pub collection_id: String,
}

/// A [`NewBook`] that passed field validation. The collection reference is
/// still unresolved.
#[derive(Debug)]
pub(crate) struct CheckedBook {
    pub title: String,
    pub author: String,
    pub review: Option<String>,
    pub rating: u8,
    pub status: BookStatus,
    pub collection_id: String,
}

impl NewBook {
    pub(crate) fn check(self) -> Result<CheckedBook, Vec<FieldError>> {
        let mut checks = Checks::default();
        let title = checks.required("title", &self.title);
        let author = checks.required("author", &self.author);
        let collection_id = checks.required("collectionId", &self.collection_id);
        let rating = checks.rating(self.rating);
        checks.finish()?;

        Ok(CheckedBook {
            title,
            author,
            review: optional_text(self.review),
            rating,
            status: self.status,
            collection_id,
        })
    }
}

/// Partial update of a book. Identifier and creation time are not
/// representable here, so they cannot change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    /// `Some(None)` for an explicit `null`, which clears the review
    #[serde(default, deserialize_with = "explicit_null")]
    pub review: Option<Option<String>>,
    pub rating: Option<i64>,
    pub status: Option<BookStatus>,
    pub collection_id: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct CheckedBookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    /// `Some(None)` clears the review
    pub review: Option<Option<String>>,
    pub rating: Option<u8>,
    pub status: Option<BookStatus>,
    pub collection_id: Option<String>,
}

impl BookPatch {
    pub(crate) fn check(self) -> Result<CheckedBookPatch, Vec<FieldError>> {
        let mut checks = Checks::default();
        let patch = CheckedBookPatch {
            title: self.title.map(|t| checks.required("title", &t)),
            author: self.author.map(|a| checks.required("author", &a)),
            review: self.review.map(optional_text),
            rating: self.rating.map(|r| checks.rating(r)),
            status: self.status,
            collection_id: self
                .collection_id
                .map(|c| checks.required("collectionId", &c)),
        };
        checks.finish()?;
        Ok(patch)
    }
}

/// Tell an absent key (`None`) apart from `null` (`Some(None)`).
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CheckedBookPatch {
    /// Apply every field except the collection, which needs a lookup first.
    pub(crate) fn apply_to(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(author) = self.author {
            book.author = author;
        }
        if let Some(review) = self.review {
            book.review = review;
        }
        if let Some(rating) = self.rating {
            book.rating = rating;
        }
        if let Some(status) = self.status {
            book.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_book(rating: i64) -> NewBook {
        NewBook {
            title: "The Hobbit".into(),
            author: "J.R.R. Tolkien".into(),
            review: None,
            rating,
            status: BookStatus::Read,
            collection_id: RecordId::new().to_string(),
        }
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(BookStatus::OnHold).unwrap(), json!("On Hold"));
        assert_eq!(serde_json::to_value(BookStatus::Tbr).unwrap(), json!("TBR"));
        let parsed: BookStatus = serde_json::from_value(json!("DNF")).unwrap();
        assert_eq!(parsed, BookStatus::Dnf);
        assert_eq!("Reading".parse::<BookStatus>().unwrap(), BookStatus::Reading);
        assert!("reading".parse::<BookStatus>().is_err());
    }

    #[test]
    fn new_book_rating_range() {
        for ok in 0..=5 {
            assert!(new_book(ok).check().is_ok());
        }
        assert!(new_book(6).check().is_err());
        assert!(new_book(-1).check().is_err());
    }

    #[test]
    fn new_book_reports_every_blank_field() {
        let input = NewBook {
            title: " ".into(),
            author: String::new(),
            collection_id: String::new(),
            ..new_book(3)
        };
        let errors = input.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "author", "collectionId"]);
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let parsed: Result<BookPatch, _> = serde_json::from_value(json!({"createdAt": "x"}));
        assert!(parsed.is_err());
        let parsed: BookPatch = serde_json::from_value(json!({"status": "Read"})).unwrap();
        assert_eq!(parsed.status, Some(BookStatus::Read));
    }

    #[test]
    fn blank_review_in_patch_clears_review() {
        let patch = BookPatch {
            review: Some(Some("   ".into())),
            ..BookPatch::default()
        };
        let checked = patch.check().unwrap();
        assert_eq!(checked.review, Some(None));
    }

    #[test]
    fn null_review_in_patch_clears_and_absent_keeps() {
        let cleared: BookPatch = serde_json::from_value(json!({"review": null})).unwrap();
        assert_eq!(cleared.check().unwrap().review, Some(None));

        let untouched: BookPatch = serde_json::from_value(json!({"title": "Emma"})).unwrap();
        assert_eq!(untouched.check().unwrap().review, None);

        let set: BookPatch = serde_json::from_value(json!({"review": " Great "})).unwrap();
        assert_eq!(set.check().unwrap().review, Some(Some("Great".into())));
    }

    #[test]
    fn new_book_rejects_unknown_fields() {
        let parsed: Result<NewBook, _> = serde_json::from_value(json!({
            "title": "Emma",
            "author": "Jane Austen",
            "collectionId": RecordId::new().to_string(),
            "dbId": "elsewhere"
        }));
        assert!(parsed.is_err());
    }
}
