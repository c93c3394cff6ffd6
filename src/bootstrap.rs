use anyhow::Context;
use axum::Router;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;
use crate::repository::Repository;

/// Registry holding every module bound to `repository`.
pub fn registry(repository: &Repository) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, repository);
    registry
}

/// Full HTTP application over `repository`, without starting any module.
pub fn router(repository: &Repository, settings: &Settings) -> Router {
    shelf_http::build_router(&registry(repository), settings)
}

/// Open the configured store, run the module lifecycle and serve until a
/// shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let store = shelf_db::connect(&settings.database)
        .await
        .context("failed to open document store")?;
    let repository = Repository::new(store);
    let registry = registry(&repository);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    shelf_db::apply_migrations(repository.store().as_ref(), &registry.collect_migrations())
        .await
        .context("failed to apply index migrations")?;

    if let Err(e) = registry.start_all(&ctx).await {
        if let Err(stop_error) = registry.stop_all().await {
            tracing::error!(error = %stop_error, "cleanup after failed start did not complete");
        }
        return Err(e);
    }

    let served = shelf_http::start_server(&registry, &settings, shelf_http::shutdown_signal()).await;
    let stopped = registry.stop_all().await;
    served?;
    stopped
}
