use chrono::Utc;
use shelf_db::{RecordId, RecordSet};

use super::{decode, encode, RecordKind, RepositoryError, Result, TenantRepository};
use crate::domain::book::BookRecord;
use crate::domain::{next_timestamp, Book, BookPatch, BookStatus, NewBook};

impl TenantRepository<'_> {
    /// All books of the tenant, in store order.
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        self.store
            .find(RecordSet::Books, &self.tenant)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn get_book(&self, id: &RecordId) -> Result<Book> {
        match self.store.find_one(RecordSet::Books, &self.tenant, id).await? {
            Some(document) => decode(document),
            None => Err(RepositoryError::not_found(RecordKind::Book, *id)),
        }
    }

    pub async fn books_in_collection(&self, collection_id: &RecordId) -> Result<Vec<Book>> {
        let books = self.list_books().await?;
        Ok(books
            .into_iter()
            .filter(|book| &book.collection_id == collection_id)
            .collect())
    }

    pub async fn books_with_status(&self, status: BookStatus) -> Result<Vec<Book>> {
        let books = self.list_books().await?;
        Ok(books.into_iter().filter(|book| book.status == status).collect())
    }

    pub async fn create_book(&self, input: NewBook) -> Result<Book> {
        let checked = input.check()?;

        let _guard = self.lock().await;
        let collection_id = self.resolve_collection(&checked.collection_id).await?;

        let now = Utc::now();
        let mut book = Book {
            id: RecordId::default(),
            title: checked.title,
            author: checked.author,
            review: checked.review,
            rating: checked.rating,
            status: checked.status,
            collection_id,
            created_at: now,
            updated_at: now,
        };
        book.id = self
            .store
            .insert(RecordSet::Books, &self.tenant, encode(&BookRecord::from(&book))?)
            .await?;

        tracing::info!(db_id = %self.tenant, book_id = %book.id, "book created");
        Ok(book)
    }

    /// Merge `patch` into the book and refresh `updatedAt`.
    pub async fn update_book(&self, id: &RecordId, patch: BookPatch) -> Result<Book> {
        let checked = patch.check()?;

        let _guard = self.lock().await;
        let mut book = self.get_book(id).await?;

        if let Some(raw) = checked.collection_id.as_deref() {
            book.collection_id = self.resolve_collection(raw).await?;
        }
        checked.apply_to(&mut book);
        book.updated_at = next_timestamp(book.updated_at);

        self.write_book(&book).await?;
        tracing::info!(db_id = %self.tenant, book_id = %book.id, "book updated");
        Ok(book)
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete_book(&self, id: &RecordId) -> Result<bool> {
        let deleted = self
            .store
            .delete_one(RecordSet::Books, &self.tenant, id)
            .await?;
        tracing::info!(db_id = %self.tenant, book_id = %id, deleted, "book delete");
        Ok(deleted)
    }

    /// Persist every field of `book`; `NotFound` if it vanished meanwhile.
    pub(super) async fn write_book(&self, book: &Book) -> Result<()> {
        let matched = self
            .store
            .update_one(
                RecordSet::Books,
                &self.tenant,
                &book.id,
                encode(&BookRecord::from(book))?,
            )
            .await?;
        if matched {
            Ok(())
        } else {
            Err(RepositoryError::not_found(RecordKind::Book, book.id))
        }
    }

    /// Parse a collection reference and check it exists in this tenant.
    async fn resolve_collection(&self, raw: &str) -> Result<RecordId> {
        let id = RecordId::parse(raw)
            .map_err(|_| RepositoryError::field("collectionId", "is not a valid identifier"))?;

        match self
            .store
            .find_one(RecordSet::Collections, &self.tenant, &id)
            .await?
        {
            Some(_) => Ok(id),
            None => Err(RepositoryError::field(
                "collectionId",
                "does not name a collection in this database",
            )),
        }
    }
}
