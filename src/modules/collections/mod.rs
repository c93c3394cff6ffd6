//! `/api/collections`: CRUD over a tenant's collections.

pub mod models;
mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use serde_json::json;
use shelf_kernel::{InitCtx, Migration, Module};

use crate::repository::Repository;

pub struct CollectionsModule {
    repository: Repository,
}

impl CollectionsModule {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Module for CollectionsModule {
    fn name(&self) -> &'static str {
        "collections"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "collections module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route(
                "/",
                get(routes::list)
                    .post(routes::create)
                    .put(routes::update)
                    .delete(routes::delete),
            )
            .with_state(self.repository.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let db_id = json!({
            "name": "dbId",
            "in": "query",
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
        let body = |schema: &str| {
            json!({
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{schema}") }
                    }
                }
            })
        };
        let collection = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/Collection" }
                    }
                }
            })
        };

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List collections",
                        "tags": ["Collections"],
                        "parameters": [db_id],
                        "responses": {
                            "200": {
                                "description": "Collections of the database",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Collection" }
                                        }
                                    }
                                }
                            },
                            "400": error("Missing or invalid dbId"),
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a collection",
                        "tags": ["Collections"],
                        "parameters": [db_id],
                        "requestBody": body("CreateCollection"),
                        "responses": {
                            "201": collection("Created collection"),
                            "409": error("A collection with this title exists"),
                            "422": error("Validation error"),
                            "500": error("Internal server error")
                        }
                    },
                    "put": {
                        "summary": "Update a collection",
                        "tags": ["Collections"],
                        "parameters": [db_id],
                        "requestBody": body("UpdateCollection"),
                        "responses": {
                            "200": collection("Updated collection"),
                            "400": error("Missing or malformed id"),
                            "404": error("Collection not found"),
                            "409": error("A collection with this title exists"),
                            "422": error("Validation error"),
                            "500": error("Internal server error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a collection, moving its books to another one",
                        "tags": ["Collections"],
                        "parameters": [db_id],
                        "requestBody": body("RecordRef"),
                        "responses": {
                            "200": { "description": "Collection deleted" },
                            "400": error("Missing or malformed id"),
                            "404": error("Collection not found"),
                            "409": error("Last collection of the database"),
                            "500": error("Internal server error or partial failure")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Collection": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "title", "description", "createdAt", "updatedAt"]
                    },
                    "CreateCollection": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["title"]
                    },
                    "UpdateCollection": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["id"]
                    },
                    "RecordRef": {
                        "type": "object",
                        "properties": { "id": { "type": "string" } },
                        "required": ["id"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_collections_by_tenant",
            collection: "collections",
            keys: &["dbId"],
            unique: false,
        }]
    }
}

pub fn create_module(repository: Repository) -> Arc<dyn Module> {
    Arc::new(CollectionsModule::new(repository))
}
