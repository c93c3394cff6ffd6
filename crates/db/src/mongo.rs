//! MongoDB-backed store.

use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use shelf_kernel::settings::DatabaseSettings;
use shelf_kernel::Migration;

use crate::{
    strip_reserved, DocumentStore, Fields, RecordId, RecordSet, StoreError, StoredDocument,
    TenantId, NATIVE_ID_FIELD, TENANT_FIELD,
};

pub struct MongoStore {
    client: Client,
    database: Database,
    operation_timeout: Duration,
}

impl MongoStore {
    /// Build a client from `settings` and verify the deployment answers a ping.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let uri = settings
            .uri
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("database.uri is not configured".to_string()))?;

        let selection_timeout = Duration::from_millis(settings.server_selection_timeout_ms);
        let mut options = ClientOptions::parse(uri).await?;
        options.app_name = Some("shelf".to_string());
        options.max_pool_size = Some(settings.max_pool_size);
        options.server_selection_timeout = Some(selection_timeout);
        options.connect_timeout = Some(selection_timeout);

        let client = Client::with_options(options)?;
        let store = Self {
            database: client.database(&settings.name),
            client,
            operation_timeout: Duration::from_millis(settings.operation_timeout_ms),
        };

        store.ping().await?;
        tracing::info!(target: "shelf-db", database = %settings.name, "connected to MongoDB");
        Ok(store)
    }

    fn collection(&self, set: RecordSet) -> Collection<Document> {
        self.database.collection(set.as_str())
    }

    /// Run a driver call under the configured operation timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: IntoFuture<Output = Result<T, mongodb::error::Error>>,
    {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.operation_timeout)),
        }
    }
}

fn scoped(tenant: &TenantId) -> Document {
    let mut filter = Document::new();
    filter.insert(TENANT_FIELD, tenant.as_str());
    filter
}

fn scoped_id(tenant: &TenantId, id: &RecordId) -> Document {
    let mut filter = scoped(tenant);
    filter.insert(NATIVE_ID_FIELD, id.object_id());
    filter
}

fn to_document(fields: Fields) -> Result<Document, StoreError> {
    mongodb::bson::to_document(&strip_reserved(fields))
        .map_err(|e| StoreError::Corrupt(format!("cannot encode document: {e}")))
}

/// Split a raw document into its identifier and plain JSON fields.
fn into_stored(mut document: Document) -> Result<StoredDocument, StoreError> {
    let id = match document.remove(NATIVE_ID_FIELD) {
        Some(Bson::ObjectId(oid)) => RecordId::from(oid),
        other => {
            return Err(StoreError::Corrupt(format!(
                "expected ObjectId {NATIVE_ID_FIELD}, found {other:?}"
            )))
        }
    };
    document.remove(TENANT_FIELD);

    // Documents written by other tools may carry native dates.
    for (_, value) in document.iter_mut() {
        if let Bson::DateTime(at) = value {
            if let Ok(text) = at.try_to_rfc3339_string() {
                *value = Bson::String(text);
            }
        }
    }

    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(fields) => Ok(StoredDocument { id, fields }),
        other => Err(StoreError::Corrupt(format!(
            "document {id} decoded to non-object {other}"
        ))),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongo"
    }

    async fn find(
        &self,
        set: RecordSet,
        tenant: &TenantId,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collection = self.collection(set);
        let documents: Vec<Document> = self
            .bounded(async {
                let cursor = collection.find(scoped(tenant)).await?;
                cursor.try_collect::<Vec<Document>>().await
            })
            .await?;

        documents.into_iter().map(into_stored).collect()
    }

    async fn find_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let found = self
            .bounded(self.collection(set).find_one(scoped_id(tenant, id)))
            .await?;
        found.map(into_stored).transpose()
    }

    async fn insert(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<RecordId, StoreError> {
        let mut document = to_document(fields)?;
        document.insert(TENANT_FIELD, tenant.as_str());

        let result = self
            .bounded(self.collection(set).insert_one(document))
            .await?;
        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(RecordId::from(oid)),
            other => Err(StoreError::Corrupt(format!(
                "store returned non-ObjectId id {other:?}"
            ))),
        }
    }

    async fn update_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
        fields: Fields,
    ) -> Result<bool, StoreError> {
        let mut changes = to_document(fields)?;
        changes.insert(TENANT_FIELD, tenant.as_str());

        let result = self
            .bounded(
                self.collection(set)
                    .update_one(scoped_id(tenant, id), doc! { "$set": changes }),
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<bool, StoreError> {
        let result = self
            .bounded(self.collection(set).delete_one(scoped_id(tenant, id)))
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_index(&self, migration: &Migration) -> Result<(), StoreError> {
        let mut keys = Document::new();
        for key in migration.keys {
            keys.insert(*key, 1);
        }
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .name(migration.id.to_string())
                    .unique(migration.unique)
                    .build(),
            )
            .build();

        self.bounded(
            self.database
                .collection::<Document>(migration.collection)
                .create_index(model),
        )
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(
            self.client
                .database("admin")
                .run_command(doc! { "ping": 1 }),
        )
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        tracing::info!(target: "shelf-db", "MongoDB client shut down");
        Ok(())
    }
}
