//! Tenant-scoped document store for shelf.
//!
//! Every read and write names a [`RecordSet`] and the [`TenantId`] that owns
//! the documents; backends include the tenant in every filter they issue.

use std::sync::Arc;

use async_trait::async_trait;
use shelf_kernel::settings::{DatabaseSettings, StoreBackend};
use shelf_kernel::Migration;

pub mod error;
pub mod ids;
pub mod memory;
pub mod mongo;

pub use error::StoreError;
pub use ids::{IdError, RecordId, TenantId};
pub use memory::{MemoryStore, StoreOp};
pub use mongo::MongoStore;

/// Field carrying the owning tenant on every stored document.
pub const TENANT_FIELD: &str = "dbId";
/// Native identifier field of the backing store.
pub const NATIVE_ID_FIELD: &str = "_id";

/// Document body without identifier or tenant tag.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// The logical record sets held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordSet {
    Books,
    Collections,
}

impl RecordSet {
    pub const ALL: [RecordSet; 2] = [RecordSet::Books, RecordSet::Collections];

    /// Name of the backing collection
    pub fn as_str(self) -> &'static str {
        match self {
            RecordSet::Books => "books",
            RecordSet::Collections => "collections",
        }
    }
}

impl std::fmt::Display for RecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: RecordId,
    pub fields: Fields,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    /// All documents of `set` owned by `tenant`, in store order
    async fn find(&self, set: RecordSet, tenant: &TenantId)
        -> Result<Vec<StoredDocument>, StoreError>;

    async fn find_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<Option<StoredDocument>, StoreError>;

    /// Insert a document and return its store-generated identifier
    async fn insert(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<RecordId, StoreError>;

    /// Set `fields` on the document matching `(id, tenant)`.
    /// Returns whether a document matched.
    async fn update_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
        fields: Fields,
    ) -> Result<bool, StoreError>;

    /// Delete the document matching `(id, tenant)`.
    /// Returns whether a document was removed.
    async fn delete_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<bool, StoreError>;

    async fn ensure_index(&self, _migration: &Migration) -> Result<(), StoreError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Drop the reserved keys so a body can never retag or re-key a document.
pub(crate) fn strip_reserved(mut fields: Fields) -> Fields {
    fields.remove(NATIVE_ID_FIELD);
    fields.remove(TENANT_FIELD);
    fields
}

/// Open the store selected by `settings.backend`.
pub async fn connect(settings: &DatabaseSettings) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::warn!(target: "shelf-db", "using in-memory store; data is not persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mongo => {
            tracing::info!(
                target: "shelf-db",
                uri = %settings.redacted_uri(),
                database = %settings.name,
                "connecting to MongoDB"
            );
            Ok(Arc::new(MongoStore::connect(settings).await?))
        }
    }
}

/// Apply index migrations in the order given.
pub async fn apply_migrations(
    store: &dyn DocumentStore,
    migrations: &[(String, Migration)],
) -> Result<(), StoreError> {
    for (module, migration) in migrations {
        tracing::info!(
            target: "shelf-db",
            module = %module,
            migration = migration.id,
            collection = migration.collection,
            "applying migration"
        );
        store.ensure_index(migration).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_sets_name_their_collections() {
        let names: Vec<_> = RecordSet::ALL.iter().map(|set| set.to_string()).collect();
        assert_eq!(names, vec!["books", "collections"]);
    }

    #[test]
    fn strip_reserved_removes_id_and_tenant() {
        let fields = json!({"_id": "x", "dbId": "other", "title": "Dune"});
        let fields = strip_reserved(fields.as_object().unwrap().clone());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["title"], "Dune");
    }

    #[tokio::test]
    async fn connect_memory_backend() {
        let settings = DatabaseSettings {
            backend: StoreBackend::Memory,
            ..DatabaseSettings::default()
        };
        let store = connect(&settings).await.unwrap();
        assert_eq!(store.backend(), "memory");
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn connect_mongo_without_uri_fails() {
        let settings = DatabaseSettings::default();
        assert!(matches!(
            connect(&settings).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
