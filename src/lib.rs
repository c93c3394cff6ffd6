//! shelf application library
//!
//! Tenant-scoped books and collections: the domain rules, the repository
//! that enforces them over a [`shelf_db::DocumentStore`], and the HTTP
//! modules that expose it.

pub mod bootstrap;
pub mod domain;
pub mod modules;
pub mod repository;

pub use bootstrap::{registry, router, run};
pub use repository::{Repository, RepositoryError};
