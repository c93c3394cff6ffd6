use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use shelf_db::DocumentStore;
use shelf_kernel::{InitCtx, Module};

/// Owns the store connection's lifecycle: verified on start, closed on stop.
pub struct StoreModule {
    store: Arc<dyn DocumentStore>,
}

impl StoreModule {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Module for StoreModule {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.store
            .ping()
            .await
            .context("document store did not answer ping")?;
        tracing::info!(
            module = self.name(),
            backend = self.store.backend(),
            database = %ctx.settings.database.name,
            "document store ready"
        );
        Ok(())
    }

    async fn health(&self) -> anyhow::Result<()> {
        self.store
            .ping()
            .await
            .context("document store did not answer ping")
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.store
            .close()
            .await
            .context("failed to close document store")?;
        tracing::info!(module = self.name(), "document store closed");
        Ok(())
    }
}
