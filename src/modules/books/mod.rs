//! `/api/books`: CRUD over a tenant's books.

pub mod models;
mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use shelf_kernel::{InitCtx, Migration, Module};

use crate::repository::Repository;

pub struct BooksModule {
    repository: Repository,
}

impl BooksModule {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
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
        let db_id = serde_json::json!({
            "name": "dbId",
            "in": "query",
            "required": true,
            "schema": { "type": "string" }
        });
        let error = serde_json::json!({
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let with_description = |description: &str| {
            let mut response = error.clone();
            response["description"] = description.into();
            response
        };
        let book = serde_json::json!({
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                }
            }
        });
        let with_book = |description: &str| {
            let mut response = book.clone();
            response["description"] = description.into();
            response
        };

        Some(serde_json::json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            db_id,
                            { "name": "collectionId", "in": "query", "schema": { "type": "string" } },
                            { "name": "status", "in": "query", "schema": { "$ref": "#/components/schemas/BookStatus" } }
                        ],
                        "responses": {
                            "200": {
                                "description": "Books of the database",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "400": with_description("Missing or invalid dbId"),
                            "500": with_description("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "parameters": [db_id],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": with_book("Created book"),
                            "400": with_description("Malformed request"),
                            "422": with_description("Validation error"),
                            "500": with_description("Internal server error")
                        }
                    },
                    "put": {
                        "summary": "Update a book",
                        "tags": ["Books"],
                        "parameters": [db_id],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/UpdateBook" }
                                }
                            }
                        },
                        "responses": {
                            "200": with_book("Updated book"),
                            "400": with_description("Missing or malformed id"),
                            "404": with_description("Book not found"),
                            "422": with_description("Validation error"),
                            "500": with_description("Internal server error")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [db_id],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/RecordRef" }
                                }
                            }
                        },
                        "responses": {
                            "200": { "description": "Book deleted" },
                            "400": with_description("Missing or malformed id"),
                            "404": with_description("Book not found"),
                            "500": with_description("Internal server error")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BookStatus": {
                        "type": "string",
                        "enum": ["TBR", "Reading", "Read", "DNF", "On Hold"]
                    },
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "review": { "type": "string", "nullable": true },
                            "rating": { "type": "integer", "minimum": 0, "maximum": 5 },
                            "status": { "$ref": "#/components/schemas/BookStatus" },
                            "collectionId": { "type": "string" },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": [
                            "id", "title", "author", "rating", "status",
                            "collectionId", "createdAt", "updatedAt"
                        ]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "review": { "type": "string" },
                            "rating": { "type": "integer", "minimum": 0, "maximum": 5 },
                            "status": { "$ref": "#/components/schemas/BookStatus" },
                            "collectionId": { "type": "string" }
                        },
                        "required": ["title", "author", "collectionId"]
                    },
                    "UpdateBook": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "author": { "type": "string" },
                            "review": { "type": "string", "nullable": true },
                            "rating": { "type": "integer", "minimum": 0, "maximum": 5 },
                            "status": { "$ref": "#/components/schemas/BookStatus" },
                            "collectionId": { "type": "string" }
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
        vec![
            Migration {
                id: "001_books_by_tenant",
                collection: "books",
                keys: &["dbId"],
                unique: false,
            },
            Migration {
                id: "002_books_by_collection",
                collection: "books",
                keys: &["dbId", "collectionId"],
                unique: false,
            },
        ]
    }
}

pub fn create_module(repository: Repository) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(repository))
}
