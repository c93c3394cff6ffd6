use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Book, BookStatus};

/// Book as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: String,
    pub title: String,
    pub author: String,
    pub review: Option<String>,
    pub rating: u8,
    pub status: BookStatus,
    pub collection_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookView {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.to_string(),
            title: book.title,
            author: book.author,
            review: book.review,
            rating: book.rating,
            status: book.status,
            collection_id: book.collection_id.to_string(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// `GET /api/books` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListQuery {
    pub db_id: Option<String>,
    pub collection_id: Option<String>,
    pub status: Option<String>,
}
