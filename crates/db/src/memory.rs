//! Process-local store used by tests and memory-backed local runs.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{strip_reserved, DocumentStore, Fields, RecordId, RecordSet, StoreError, StoredDocument, TenantId};

/// Store operations that can be made to fail or stall on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Find,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct Entry {
    id: RecordId,
    tenant: TenantId,
    fields: Fields,
}

#[derive(Default)]
struct State {
    sets: HashMap<RecordSet, Vec<Entry>>,
    failures: HashSet<(StoreOp, RecordSet)>,
    stalls: HashMap<(StoreOp, RecordSet), Duration>,
}

impl State {
    fn check(&self, op: StoreOp, set: RecordSet) -> Result<(), StoreError> {
        if self.failures.contains(&(op, set)) {
            return Err(StoreError::Unavailable(format!(
                "injected {op:?} failure on {set}"
            )));
        }
        Ok(())
    }

    fn entries(&self, set: RecordSet) -> &[Entry] {
        self.sets.get(&set).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Insertion-ordered in-memory documents.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `op` on `set` fail with [`StoreError::Unavailable`] until
    /// [`MemoryStore::clear_failures`] is called.
    pub async fn fail_on(&self, op: StoreOp, set: RecordSet) {
        self.state.write().await.failures.insert((op, set));
    }

    /// Delay every `op` on `set` by `delay` before it touches the data.
    pub async fn stall_on(&self, op: StoreOp, set: RecordSet, delay: Duration) {
        self.state.write().await.stalls.insert((op, set), delay);
    }

    /// Remove injected failures and stalls
    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.failures.clear();
        state.stalls.clear();
    }

    async fn pause(&self, op: StoreOp, set: RecordSet) {
        let delay = self.state.read().await.stalls.get(&(op, set)).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Number of documents in `set` across every tenant
    pub async fn len(&self, set: RecordSet) -> usize {
        self.state.read().await.entries(set).len()
    }

    pub async fn is_empty(&self) -> bool {
        let state = self.state.read().await;
        RecordSet::ALL.iter().all(|set| state.entries(*set).is_empty())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(
        &self,
        set: RecordSet,
        tenant: &TenantId,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.pause(StoreOp::Find, set).await;
        let state = self.state.read().await;
        state.check(StoreOp::Find, set)?;
        Ok(state
            .entries(set)
            .iter()
            .filter(|entry| &entry.tenant == tenant)
            .map(|entry| StoredDocument {
                id: entry.id,
                fields: entry.fields.clone(),
            })
            .collect())
    }

    async fn find_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<Option<StoredDocument>, StoreError> {
        self.pause(StoreOp::Find, set).await;
        let state = self.state.read().await;
        state.check(StoreOp::Find, set)?;
        Ok(state
            .entries(set)
            .iter()
            .find(|entry| &entry.id == id && &entry.tenant == tenant)
            .map(|entry| StoredDocument {
                id: entry.id,
                fields: entry.fields.clone(),
            }))
    }

    async fn insert(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<RecordId, StoreError> {
        self.pause(StoreOp::Insert, set).await;
        let mut state = self.state.write().await;
        state.check(StoreOp::Insert, set)?;
        let id = RecordId::new();
        state.sets.entry(set).or_default().push(Entry {
            id,
            tenant: tenant.clone(),
            fields: strip_reserved(fields),
        });
        Ok(id)
    }

    async fn update_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
        fields: Fields,
    ) -> Result<bool, StoreError> {
        self.pause(StoreOp::Update, set).await;
        let mut state = self.state.write().await;
        state.check(StoreOp::Update, set)?;
        let entry = state
            .sets
            .get_mut(&set)
            .and_then(|entries| {
                entries
                    .iter_mut()
                    .find(|entry| &entry.id == id && &entry.tenant == tenant)
            });

        match entry {
            Some(entry) => {
                // `$set` semantics: listed keys are overwritten, the rest kept.
                entry.fields.extend(strip_reserved(fields));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(
        &self,
        set: RecordSet,
        tenant: &TenantId,
        id: &RecordId,
    ) -> Result<bool, StoreError> {
        self.pause(StoreOp::Delete, set).await;
        let mut state = self.state.write().await;
        state.check(StoreOp::Delete, set)?;
        let Some(entries) = state.sets.get_mut(&set) else {
            return Ok(false);
        };
        let before = entries.len();
        entries.retain(|entry| !(&entry.id == id && &entry.tenant == tenant));
        Ok(entries.len() < before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn find_is_scoped_and_ordered() {
        let store = MemoryStore::new();
        let t1 = tenant("t-one");
        let t2 = tenant("t-two");

        let first = store
            .insert(RecordSet::Books, &t1, fields(json!({"title": "A"})))
            .await
            .unwrap();
        store
            .insert(RecordSet::Books, &t2, fields(json!({"title": "B"})))
            .await
            .unwrap();
        let third = store
            .insert(RecordSet::Books, &t1, fields(json!({"title": "C"})))
            .await
            .unwrap();

        let docs = store.find(RecordSet::Books, &t1).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![first, third]);
        assert!(store.find(RecordSet::Collections, &t1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_require_matching_tenant() {
        let store = MemoryStore::new();
        let owner = tenant("owner");
        let intruder = tenant("intruder");
        let id = store
            .insert(RecordSet::Books, &owner, fields(json!({"title": "A"})))
            .await
            .unwrap();

        let matched = store
            .update_one(RecordSet::Books, &intruder, &id, fields(json!({"title": "X"})))
            .await
            .unwrap();
        assert!(!matched);
        assert!(!store.delete_one(RecordSet::Books, &intruder, &id).await.unwrap());
        assert!(store
            .find_one(RecordSet::Books, &intruder, &id)
            .await
            .unwrap()
            .is_none());

        let doc = store
            .find_one(RecordSet::Books, &owner, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields["title"], "A");
    }

    #[tokio::test]
    async fn update_merges_and_ignores_reserved_keys() {
        let store = MemoryStore::new();
        let owner = tenant("owner");
        let id = store
            .insert(
                RecordSet::Books,
                &owner,
                fields(json!({"title": "A", "author": "B"})),
            )
            .await
            .unwrap();

        store
            .update_one(
                RecordSet::Books,
                &owner,
                &id,
                fields(json!({"title": "A2", "dbId": "elsewhere"})),
            )
            .await
            .unwrap();

        let doc = store
            .find_one(RecordSet::Books, &owner, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.fields["title"], "A2");
        assert_eq!(doc.fields["author"], "B");
        assert!(!doc.fields.contains_key("dbId"));
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = MemoryStore::new();
        let owner = tenant("owner");
        let id = store
            .insert(RecordSet::Collections, &owner, Fields::new())
            .await
            .unwrap();

        assert!(store.delete_one(RecordSet::Collections, &owner, &id).await.unwrap());
        assert!(!store.delete_one(RecordSet::Collections, &owner, &id).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn injected_failures_surface_until_cleared() {
        let store = MemoryStore::new();
        let owner = tenant("owner");
        store.fail_on(StoreOp::Insert, RecordSet::Books).await;

        let err = store
            .insert(RecordSet::Books, &owner, Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.clear_failures().await;
        store.insert(RecordSet::Books, &owner, Fields::new()).await.unwrap();
        assert_eq!(store.len(RecordSet::Books).await, 1);
    }

    #[tokio::test]
    async fn stalled_operation_waits_before_applying() {
        let store = MemoryStore::new();
        let owner = tenant("owner");
        let id = store
            .insert(RecordSet::Collections, &owner, Fields::new())
            .await
            .unwrap();
        store
            .stall_on(StoreOp::Delete, RecordSet::Collections, Duration::from_millis(200))
            .await;

        let early = tokio::time::timeout(
            Duration::from_millis(20),
            store.delete_one(RecordSet::Collections, &owner, &id),
        )
        .await;
        assert!(early.is_err());
        assert_eq!(store.len(RecordSet::Collections).await, 1);

        store.clear_failures().await;
        assert!(store.delete_one(RecordSet::Collections, &owner, &id).await.unwrap());
    }
}
