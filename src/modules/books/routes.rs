use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use shelf_db::RecordId;
use shelf_http::error::AppError;

use super::models::{BookListQuery, BookView};
use crate::domain::{BookPatch, BookStatus, NewBook};
use crate::modules::wire::{self, IdentifiedBody, TenantQuery};
use crate::repository::{RecordKind, Repository, RepositoryError};

pub(super) async fn list(
    State(repository): State<Repository>,
    query: Result<Query<BookListQuery>, QueryRejection>,
) -> Result<Json<Vec<BookView>>, AppError> {
    let query = wire::query(query)?;
    let tenant = wire::tenant_from(query.db_id.as_deref())?;

    let collection = query
        .collection_id
        .as_deref()
        .map(RecordId::parse)
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid collectionId format"))?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<BookStatus>)
        .transpose()
        .map_err(AppError::bad_request)?;

    let scoped = repository.tenant(tenant);
    let books = match (collection, status) {
        (Some(collection), status) => scoped
            .books_in_collection(&collection)
            .await?
            .into_iter()
            .filter(|book| status.is_none_or(|s| book.status == s))
            .collect(),
        (None, Some(status)) => scoped.books_with_status(status).await?,
        (None, None) => scoped.list_books().await?,
    };

    Ok(Json(books.into_iter().map(BookView::from).collect()))
}

pub(super) async fn create(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<NewBook>, JsonRejection>,
) -> Result<(StatusCode, Json<BookView>), AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let input = wire::json_body(body)?;

    let book = repository.tenant(tenant).create_book(input).await?;
    Ok((StatusCode::CREATED, Json(book.into())))
}

pub(super) async fn update(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<IdentifiedBody>, JsonRejection>,
) -> Result<Json<BookView>, AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let (id, patch) = wire::json_body(body)?.into_patch::<BookPatch>()?;

    let book = repository.tenant(tenant).update_book(&id, patch).await?;
    Ok(Json(book.into()))
}

pub(super) async fn delete(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<IdentifiedBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let id = wire::json_body(body)?.record_id()?;

    if !repository.tenant(tenant).delete_book(&id).await? {
        return Err(RepositoryError::not_found(RecordKind::Book, id).into());
    }
    Ok(wire::success())
}
