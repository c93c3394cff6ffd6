//! Request parsing and error mapping shared by the record modules.
//!
//! The store's native `_id` never crosses this boundary: records leave as
//! views with a public `id`, and `_id` is only accepted as an input alias.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use shelf_db::{Fields, RecordId, TenantId};
use shelf_http::error::AppError;

use crate::repository::RepositoryError;

/// Body keys a client may never set on update.
pub const IMMUTABLE_FIELDS: &[&str] = &["createdAt", "dbId"];
/// Body keys accepted on update but owned by the server.
const SERVER_FIELDS: &[&str] = &["updatedAt"];

/// `?dbId=` on every record endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    #[serde(rename = "dbId")]
    pub db_id: Option<String>,
}

impl TenantQuery {
    pub fn tenant(&self) -> Result<TenantId, AppError> {
        tenant_from(self.db_id.as_deref())
    }
}

pub fn tenant_from(raw: Option<&str>) -> Result<TenantId, AppError> {
    let raw = raw.ok_or_else(|| AppError::bad_request("dbId is required as a query parameter"))?;
    TenantId::parse(raw).map_err(|e| AppError::bad_request(e.to_string()))
}

/// Body of PUT and DELETE: the record id plus, for PUT, the changed fields.
#[derive(Debug, Deserialize)]
pub struct IdentifiedBody {
    #[serde(default, alias = "_id")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl IdentifiedBody {
    /// Missing and malformed ids are both client errors, distinct from a
    /// well-formed id that matches nothing.
    pub fn record_id(&self) -> Result<RecordId, AppError> {
        match &self.id {
            None | Some(Value::Null) => Err(AppError::bad_request("Missing id")),
            Some(Value::String(raw)) => {
                RecordId::parse(raw).map_err(|_| AppError::bad_request("Invalid id format"))
            }
            Some(_) => Err(AppError::bad_request("Invalid id format")),
        }
    }

    /// Split into the id and a typed patch.
    pub fn into_patch<T: DeserializeOwned>(self) -> Result<(RecordId, T), AppError> {
        let id = self.record_id()?;
        let mut fields = self.fields;

        let locked: Vec<Value> = IMMUTABLE_FIELDS
            .iter()
            .filter(|key| fields.contains_key(**key))
            .map(|key| json!({ "field": key, "error": "cannot be changed" }))
            .collect();
        if !locked.is_empty() {
            return Err(AppError::validation(locked, "request changes immutable fields"));
        }
        for key in SERVER_FIELDS {
            fields.remove(*key);
        }

        let patch = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::bad_request(format!("invalid body: {e}")))?;
        Ok((id, patch))
    }
}

pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

pub fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// `{ "success": true }`
pub fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

impl From<RepositoryError> for AppError {
    fn from(error: RepositoryError) -> Self {
        let message = error.to_string();
        match error {
            RepositoryError::Validation(errors) => {
                let details = errors
                    .iter()
                    .map(|e| json!({ "field": e.field, "error": e.error }))
                    .collect();
                AppError::validation(details, message)
            }
            RepositoryError::InvalidId(_) => AppError::bad_request(message),
            RepositoryError::NotFound { .. } => AppError::not_found(message),
            RepositoryError::DuplicateName(_) => AppError::conflict(
                vec![json!({ "field": "title", "error": "already exists" })],
                message,
            ),
            RepositoryError::LastCollection(id) => AppError::conflict_with_code(
                "last_collection",
                vec![json!({ "collectionId": id.to_string() })],
                message,
            ),
            RepositoryError::DatabaseExists(_) => AppError::conflict(vec![], message),
            RepositoryError::IncompleteCollectionDelete { .. } => AppError::incomplete(message),
            RepositoryError::Interrupted(source) => {
                AppError::Internal(anyhow::Error::new(source).context("operation interrupted"))
            }
            RepositoryError::Store(source) => {
                AppError::Internal(anyhow::Error::new(source).context("document store failure"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use shelf_db::StoreError;

    fn body(value: Value) -> IdentifiedBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn tenant_is_required_and_validated() {
        assert_eq!(
            TenantQuery::default().tenant().unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
        assert!(tenant_from(Some("a b")).is_err());
        assert_eq!(tenant_from(Some("demo-db-123")).unwrap().as_str(), "demo-db-123");
    }

    #[test]
    fn record_id_accepts_both_spellings() {
        let id = RecordId::new();
        assert_eq!(body(json!({"id": id.to_string()})).record_id().unwrap(), id);
        assert_eq!(body(json!({"_id": id.to_string()})).record_id().unwrap(), id);
    }

    #[test]
    fn record_id_missing_or_malformed_is_bad_request() {
        for value in [json!({}), json!({"id": null}), json!({"id": "nope"}), json!({"id": 7})] {
            let error = body(value).record_id().unwrap_err();
            assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn into_patch_rejects_immutable_and_drops_server_fields() {
        let id = RecordId::new();
        let error = body(json!({"id": id.to_string(), "createdAt": "2020-01-01T00:00:00Z"}))
            .into_patch::<crate::domain::BookPatch>()
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let (parsed_id, patch) = body(json!({
            "id": id.to_string(),
            "status": "Read",
            "updatedAt": "2020-01-01T00:00:00Z"
        }))
        .into_patch::<crate::domain::BookPatch>()
        .unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(patch.status, Some(crate::domain::BookStatus::Read));

        let error = body(json!({"id": id.to_string(), "colour": "red"}))
            .into_patch::<crate::domain::BookPatch>()
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn repository_errors_map_to_statuses() {
        let cases = [
            (
                RepositoryError::not_found(crate::repository::RecordKind::Book, RecordId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                RepositoryError::DuplicateName("General".into()),
                StatusCode::CONFLICT,
            ),
            (
                RepositoryError::LastCollection(RecordId::new()),
                StatusCode::CONFLICT,
            ),
            (
                RepositoryError::field("rating", "must be between 0 and 5"),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RepositoryError::Store(StoreError::Unavailable("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }
}
