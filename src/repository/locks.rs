use std::sync::Arc;

use dashmap::DashMap;
use shelf_db::TenantId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per tenant, serializing read-check-write sequences
/// within this process.
///
/// An entry lives only while someone holds or waits for it.
#[derive(Default)]
pub struct TenantLocks {
    locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, tenant: &TenantId) -> TenantGuard<'_> {
        let lock = Arc::clone(self.locks.entry(tenant.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        TenantGuard {
            locks: self,
            tenant: tenant.clone(),
            guard: Some(guard),
        }
    }

    /// Tenants with a live entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock of one tenant; the table entry is evicted on release when no
/// other task is waiting for it.
pub struct TenantGuard<'a> {
    locks: &'a TenantLocks,
    tenant: TenantId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TenantGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map
        // still refers to the mutex. The shard lock makes the check atomic
        // with respect to `acquire`.
        self.locks
            .locks
            .remove_if(&self.tenant, |_, lock| Arc::strong_count(lock) == 1);
    }
}
