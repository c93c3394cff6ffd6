//! Tenant-scoped data access.
//!
//! [`Repository`] owns the store handle; [`Repository::tenant`] hands out a
//! [`TenantRepository`] bound to one `dbId`, and every operation on it is
//! filtered and tagged by that tenant.

mod books;
mod collections;
pub mod error;
pub mod locks;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shelf_db::{DocumentStore, Fields, RecordId, RecordSet, StoreError, StoredDocument, TenantId};

use crate::domain::collection::{DEFAULT_COLLECTION_DESCRIPTION, DEFAULT_COLLECTION_TITLE};
use crate::domain::{BookStatus, Collection, NewCollection};

pub use error::{RecordKind, RepositoryError};
pub use locks::{TenantGuard, TenantLocks};

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;

/// Attempts at drawing an unused random database id.
const MAX_ID_ATTEMPTS: usize = 10;

/// Shared handle over the document store.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    locks: Arc<TenantLocks>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            locks: Arc::new(TenantLocks::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Operations scoped to `tenant`
    pub fn tenant(&self, tenant: TenantId) -> TenantRepository<'_> {
        TenantRepository {
            store: self.store.as_ref(),
            locks: &self.locks,
            tenant,
        }
    }

    /// Delete a collection of `tenant` on a task of its own.
    ///
    /// The reassign-then-delete sequence runs to completion even when the
    /// caller stops waiting, so a cancelled request cannot leave it halfway.
    pub async fn delete_collection(&self, tenant: TenantId, id: RecordId) -> Result<bool> {
        let repository = self.clone();
        let task =
            tokio::spawn(async move { repository.tenant(tenant).delete_collection(&id).await });
        task.await?
    }

    /// True iff any book or collection carries `tenant`.
    pub async fn database_exists(&self, tenant: &TenantId) -> Result<bool> {
        self.tenant(tenant.clone()).database_exists().await
    }

    /// Create a database seeded with the default collection.
    ///
    /// With `requested == None` a random id is drawn; otherwise the given id
    /// is used and must not exist yet.
    pub async fn create_database(&self, requested: Option<TenantId>) -> Result<TenantId> {
        if let Some(tenant) = requested {
            let scoped = self.tenant(tenant.clone());
            let _guard = scoped.lock().await;
            if scoped.database_exists().await? {
                return Err(RepositoryError::DatabaseExists(tenant));
            }
            scoped.seed_default_collection().await?;
            return Ok(tenant);
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let scoped = self.tenant(TenantId::generate());
            let _guard = scoped.lock().await;
            if scoped.database_exists().await? {
                tracing::warn!(db_id = %scoped.tenant, "generated database id already taken");
                continue;
            }
            scoped.seed_default_collection().await?;
            return Ok(scoped.tenant);
        }

        Err(StoreError::Unavailable(format!(
            "could not allocate a unique database id after {MAX_ID_ATTEMPTS} attempts"
        ))
        .into())
    }
}

/// Per-tenant dashboard numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_books: usize,
    pub collections: Vec<Collection>,
    /// One entry per status, zero included
    pub status_counts: BTreeMap<BookStatus, usize>,
}

/// Repository view bound to a single tenant.
pub struct TenantRepository<'a> {
    store: &'a dyn DocumentStore,
    locks: &'a TenantLocks,
    tenant: TenantId,
}

impl<'a> TenantRepository<'a> {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant
    }

    async fn lock(&self) -> TenantGuard<'a> {
        self.locks.acquire(&self.tenant).await
    }

    /// True iff the tenant has at least one book or collection.
    pub async fn database_exists(&self) -> Result<bool> {
        if !self.store.find(RecordSet::Collections, &self.tenant).await?.is_empty() {
            return Ok(true);
        }
        Ok(!self.store.find(RecordSet::Books, &self.tenant).await?.is_empty())
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        let books = self.list_books().await?;
        let collections = self.list_collections().await?;

        let mut status_counts: BTreeMap<BookStatus, usize> =
            BookStatus::ALL.into_iter().map(|status| (status, 0)).collect();
        for book in &books {
            *status_counts.entry(book.status).or_default() += 1;
        }

        Ok(DashboardStats {
            total_books: books.len(),
            collections,
            status_counts,
        })
    }

    async fn seed_default_collection(&self) -> Result<Collection> {
        let collection = self
            .insert_collection(NewCollection::new(
                DEFAULT_COLLECTION_TITLE,
                DEFAULT_COLLECTION_DESCRIPTION,
            ))
            .await?;
        tracing::info!(db_id = %self.tenant, collection_id = %collection.id, "database created");
        Ok(collection)
    }
}

/// Turn a stored document into a record, exposing the store id as `id`.
pub(crate) fn decode<T: DeserializeOwned>(document: StoredDocument) -> Result<T> {
    let StoredDocument { id, mut fields } = document;
    fields.insert("id".to_string(), serde_json::Value::String(id.to_string()));
    serde_json::from_value(serde_json::Value::Object(fields)).map_err(|e| {
        StoreError::Corrupt(format!("document {id} does not match its schema: {e}")).into()
    })
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Corrupt(format!("record encoded as non-object {other}")).into()),
        Err(e) => Err(StoreError::Corrupt(format!("cannot encode record: {e}")).into()),
    }
}
