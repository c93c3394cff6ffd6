pub mod books;
pub mod collections;
pub mod databases;
pub mod store;
pub mod wire;

use std::sync::Arc;

use shelf_kernel::ModuleRegistry;

use crate::repository::Repository;

/// Register the store lifecycle and every HTTP module with the registry
pub fn register_all(registry: &mut ModuleRegistry, repository: &Repository) {
    registry.register_core(Arc::new(store::StoreModule::new(repository.store().clone())));
    registry.register_custom(books::create_module(repository.clone()));
    registry.register_custom(collections::create_module(repository.clone()));
    registry.register_custom(databases::create_module(repository.clone()));
}
