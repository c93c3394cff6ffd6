use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;
use shelf_http::error::AppError;

use super::models::CollectionView;
use crate::domain::{CollectionPatch, NewCollection};
use crate::modules::wire::{self, IdentifiedBody, TenantQuery};
use crate::repository::{RecordKind, Repository, RepositoryError};

pub(super) async fn list(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
) -> Result<Json<Vec<CollectionView>>, AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let collections = repository.tenant(tenant).list_collections().await?;
    Ok(Json(collections.into_iter().map(CollectionView::from).collect()))
}

pub(super) async fn create(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<NewCollection>, JsonRejection>,
) -> Result<(StatusCode, Json<CollectionView>), AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let input = wire::json_body(body)?;

    let collection = repository.tenant(tenant).create_collection(input).await?;
    Ok((StatusCode::CREATED, Json(collection.into())))
}

pub(super) async fn update(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<IdentifiedBody>, JsonRejection>,
) -> Result<Json<CollectionView>, AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let (id, patch) = wire::json_body(body)?.into_patch::<CollectionPatch>()?;

    let collection = repository
        .tenant(tenant)
        .update_collection(&id, patch)
        .await?;
    Ok(Json(collection.into()))
}

/// Books of the deleted collection move to another collection first.
pub(super) async fn delete(
    State(repository): State<Repository>,
    query: Result<Query<TenantQuery>, QueryRejection>,
    body: Result<Json<IdentifiedBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let tenant = wire::query(query)?.tenant()?;
    let id = wire::json_body(body)?.record_id()?;

    if !repository.delete_collection(tenant, id).await? {
        return Err(RepositoryError::not_found(RecordKind::Collection, id).into());
    }
    Ok(wire::success())
}
