//! `/api/databases`: provisioning and inspection of tenant databases.
//!
//! A database exists as soon as it owns one record; creating one seeds the
//! default collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::error::AppError;
use shelf_kernel::Module;

use super::collections::models::CollectionView;
use super::wire;
use crate::repository::{DashboardStats, Repository};

pub struct DatabasesModule {
    repository: Repository,
}

impl DatabasesModule {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CreateDatabase {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub total_books: usize,
    pub collections: Vec<CollectionView>,
    pub status_counts: BTreeMap<String, usize>,
}

impl From<DashboardStats> for StatsView {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_books: stats.total_books,
            collections: stats.collections.into_iter().map(Into::into).collect(),
            status_counts: stats
                .status_counts
                .into_iter()
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
        }
    }
}

#[async_trait]
impl Module for DatabasesModule {
    fn name(&self) -> &'static str {
        "databases"
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(create))
            .route("/{db_id}", get(show))
            .route("/{db_id}/stats", get(stats))
            .with_state(self.repository.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let db_id = json!({
            "name": "db_id",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        });
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };

        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Create a database seeded with a default collection",
                        "tags": ["Databases"],
                        "requestBody": {
                            "required": false,
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": { "id": { "type": "string" } }
                                    }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Database created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/DatabaseRef" }
                                    }
                                }
                            },
                            "400": error("Invalid database id"),
                            "409": error("Database already exists"),
                            "500": error("Internal server error")
                        }
                    }
                },
                "/{db_id}": {
                    "get": {
                        "summary": "Check that a database exists",
                        "tags": ["Databases"],
                        "parameters": [db_id],
                        "responses": {
                            "200": {
                                "description": "Database exists",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/DatabaseRef" }
                                    }
                                }
                            },
                            "400": error("Invalid database id"),
                            "404": error("Database not found")
                        }
                    }
                },
                "/{db_id}/stats": {
                    "get": {
                        "summary": "Dashboard numbers for a database",
                        "tags": ["Databases"],
                        "parameters": [db_id],
                        "responses": {
                            "200": {
                                "description": "Database statistics",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/DatabaseStats" }
                                    }
                                }
                            },
                            "400": error("Invalid database id"),
                            "404": error("Database not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "DatabaseRef": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "exists": { "type": "boolean" }
                        },
                        "required": ["id"]
                    },
                    "DatabaseStats": {
                        "type": "object",
                        "properties": {
                            "totalBooks": { "type": "integer" },
                            "collections": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Collection" }
                            },
                            "statusCounts": {
                                "type": "object",
                                "additionalProperties": { "type": "integer" }
                            }
                        },
                        "required": ["totalBooks", "collections", "statusCounts"]
                    }
                }
            }
        }))
    }
}

async fn create(
    State(repository): State<Repository>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let request: CreateDatabase = if body.iter().all(u8::is_ascii_whitespace) {
        CreateDatabase::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid body: {e}")))?
    };
    let requested = request
        .id
        .as_deref()
        .map(|id| wire::tenant_from(Some(id)))
        .transpose()?;

    let tenant = repository.create_database(requested).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": tenant }))))
}

async fn show(
    State(repository): State<Repository>,
    Path(db_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tenant = wire::tenant_from(Some(db_id.as_str()))?;
    if !repository.database_exists(&tenant).await? {
        return Err(AppError::not_found(format!("database '{tenant}' not found")));
    }
    Ok(Json(json!({ "id": tenant, "exists": true })))
}

async fn stats(
    State(repository): State<Repository>,
    Path(db_id): Path<String>,
) -> Result<Json<StatsView>, AppError> {
    let tenant = wire::tenant_from(Some(db_id.as_str()))?;
    let scoped = repository.tenant(tenant);
    if !scoped.database_exists().await? {
        return Err(AppError::not_found(format!(
            "database '{}' not found",
            scoped.tenant_id()
        )));
    }
    Ok(Json(scoped.stats().await?.into()))
}

pub fn create_module(repository: Repository) -> Arc<dyn Module> {
    Arc::new(DatabasesModule::new(repository))
}
