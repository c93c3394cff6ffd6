use chrono::Utc;
use shelf_db::{RecordId, RecordSet};

use super::{decode, encode, RecordKind, RepositoryError, Result, TenantRepository};
use crate::domain::collection::CollectionRecord;
use crate::domain::{next_timestamp, Collection, CollectionPatch, NewCollection};

impl TenantRepository<'_> {
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.store
            .find(RecordSet::Collections, &self.tenant)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn get_collection(&self, id: &RecordId) -> Result<Collection> {
        match self
            .store
            .find_one(RecordSet::Collections, &self.tenant, id)
            .await?
        {
            Some(document) => decode(document),
            None => Err(RepositoryError::not_found(RecordKind::Collection, *id)),
        }
    }

    /// Fails with `DuplicateName` when the trimmed, case-folded title is taken.
    pub async fn create_collection(&self, input: NewCollection) -> Result<Collection> {
        let _guard = self.lock().await;
        self.insert_collection(input).await
    }

    /// Caller must hold the tenant lock.
    pub(super) async fn insert_collection(&self, input: NewCollection) -> Result<Collection> {
        let input = input.check()?;

        let existing = self.list_collections().await?;
        if existing.iter().any(|c| c.has_title(&input.title)) {
            return Err(RepositoryError::DuplicateName(input.title));
        }

        let now = Utc::now();
        let mut collection = Collection {
            id: RecordId::default(),
            title: input.title,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        collection.id = self
            .store
            .insert(
                RecordSet::Collections,
                &self.tenant,
                encode(&CollectionRecord::from(&collection))?,
            )
            .await?;

        tracing::info!(db_id = %self.tenant, collection_id = %collection.id, "collection created");
        Ok(collection)
    }

    pub async fn update_collection(
        &self,
        id: &RecordId,
        patch: CollectionPatch,
    ) -> Result<Collection> {
        let patch = patch.check()?;

        let _guard = self.lock().await;
        let collections = self.list_collections().await?;
        let mut collection = collections
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(RecordKind::Collection, *id))?;

        if let Some(title) = patch.title.as_deref() {
            if collections
                .iter()
                .any(|c| &c.id != id && c.has_title(title))
            {
                return Err(RepositoryError::DuplicateName(title.to_string()));
            }
        }

        patch.apply_to(&mut collection);
        collection.updated_at = next_timestamp(collection.updated_at);

        let matched = self
            .store
            .update_one(
                RecordSet::Collections,
                &self.tenant,
                id,
                encode(&CollectionRecord::from(&collection))?,
            )
            .await?;
        if !matched {
            return Err(RepositoryError::not_found(RecordKind::Collection, *id));
        }

        tracing::info!(db_id = %self.tenant, collection_id = %id, "collection updated");
        Ok(collection)
    }

    /// Delete a collection after moving its books to the first remaining
    /// collection.
    ///
    /// Returns `false` if the collection does not exist. Refuses to delete
    /// the tenant's last collection. A store failure after the first book
    /// was moved is reported as `IncompleteCollectionDelete`.
    pub async fn delete_collection(&self, id: &RecordId) -> Result<bool> {
        let _guard = self.lock().await;

        let collections = self.list_collections().await?;
        if !collections.iter().any(|c| &c.id == id) {
            return Ok(false);
        }
        let Some(target) = collections.iter().find(|c| &c.id != id).map(|c| c.id) else {
            return Err(RepositoryError::LastCollection(*id));
        };

        let books = self.books_in_collection(id).await?;
        let mut reassigned = 0;
        for mut book in books {
            book.collection_id = target;
            book.updated_at = next_timestamp(book.updated_at);
            match self.write_book(&book).await {
                Ok(()) => reassigned += 1,
                // Deleted concurrently; nothing left to move.
                Err(RepositoryError::NotFound { .. }) => {}
                Err(RepositoryError::Store(source)) if reassigned > 0 => {
                    return Err(RepositoryError::IncompleteCollectionDelete {
                        collection_id: *id,
                        target,
                        reassigned,
                        source,
                    });
                }
                Err(other) => return Err(other),
            }
        }

        let deleted = match self
            .store
            .delete_one(RecordSet::Collections, &self.tenant, id)
            .await
        {
            Ok(deleted) => deleted,
            Err(source) if reassigned > 0 => {
                tracing::error!(
                    db_id = %self.tenant,
                    collection_id = %id,
                    reassigned,
                    error = %source,
                    "collection delete failed after books were moved"
                );
                return Err(RepositoryError::IncompleteCollectionDelete {
                    collection_id: *id,
                    target,
                    reassigned,
                    source,
                });
            }
            Err(source) => return Err(source.into()),
        };

        if !deleted {
            tracing::warn!(db_id = %self.tenant, collection_id = %id, "collection vanished before delete");
        } else {
            tracing::info!(
                db_id = %self.tenant,
                collection_id = %id,
                moved_to = %target,
                reassigned,
                "collection deleted"
            );
        }
        Ok(deleted)
    }
}
