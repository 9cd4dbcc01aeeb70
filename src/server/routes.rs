use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use crate::Error;
use crate::collection::Collection;
use crate::document::{self, Document};
use crate::query::{ListParams, ListQuery};
use crate::server::AppState;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Handler-boundary error; every storage failure ends up as one of these
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(Option<String>),
    Server,
    EndpointNotFound,
}

impl ApiError {
    /// List failures
    fn read(err: Error) -> Self {
        tracing::error!("{}", err);
        ApiError::Server
    }

    /// Get/Delete failures
    fn lookup(err: Error) -> Self {
        match err {
            Error::NotFound => ApiError::NotFound,
            other => {
                tracing::error!("{}", other);
                ApiError::BadRequest(None)
            }
        }
    }

    /// Create/Update failures, reported with the underlying message
    fn write(err: Error) -> Self {
        match err {
            Error::NotFound => ApiError::NotFound,
            other => {
                tracing::error!("{}", other);
                ApiError::BadRequest(Some(other.to_string()))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found", None),
            ApiError::BadRequest(details) => (StatusCode::BAD_REQUEST, "bad request", details),
            ApiError::Server => (StatusCode::INTERNAL_SERVER_ERROR, "server error", None),
            ApiError::EndpointNotFound => (StatusCode::NOT_FOUND, "endpoint not found", None),
        };
        let body = ErrorResponse { error: error.to_string(), details };
        (status, Json(body)).into_response()
    }
}

fn parse_body(body: &Bytes) -> crate::Result<Document> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::BadRequest(format!("malformed JSON body: {}", e)))?;
    document::into_document(value)
}

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Extension(collection): Extension<Collection>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(pairs) = pairs.map_err(|e| ApiError::BadRequest(Some(e.body_text())))?;
    let backend = state.router.backend(state.health.current());
    let query = ListQuery::from(pairs.into_iter().collect::<ListParams>());

    let page = backend.list(collection, &query).await.map_err(ApiError::read)?;

    let mut response = Json(page.items).into_response();
    if let Some(total) = page.total {
        response
            .headers_mut()
            .insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    }
    Ok(response)
}

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Extension(collection): Extension<Collection>,
    body: Bytes,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let backend = state.router.backend(state.health.current());
    let doc = parse_body(&body).map_err(ApiError::write)?;

    let created = backend.create(collection, doc).await.map_err(ApiError::write)?;
    tracing::debug!("Created document in {} via {}", collection, backend.kind().as_str());
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let backend = state.router.backend(state.health.current());
    let doc = backend.get(collection, &id).await.map_err(ApiError::lookup)?;
    Ok(Json(doc))
}

pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Document>, ApiError> {
    let backend = state.router.backend(state.health.current());
    let partial = parse_body(&body).map_err(ApiError::write)?;

    let merged = backend
        .update(collection, &id, partial)
        .await
        .map_err(ApiError::write)?;
    Ok(Json(merged))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Extension(collection): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let backend = state.router.backend(state.health.current());
    backend.delete(collection, &id).await.map_err(ApiError::lookup)?;
    Ok(Json(json!({"success": true})))
}

pub async fn endpoint_not_found() -> ApiError {
    ApiError::EndpointNotFound
}
