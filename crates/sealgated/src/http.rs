//! REST front end over the same gateway
//!
//! Routes:
//!   POST   /records            {"id": hex, "data": hex}  -> 201 {id, key, data}
//!   GET    /records/{id}?key=  -> 200 {id, key, data}
//!   DELETE /records/{id}       -> 202

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sealgate_core::{BackendError, SealgateError};
use sealgate_gateway::Gateway;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::RequestMetrics;

#[derive(Clone)]
pub struct HttpState {
    pub gateway: Arc<Gateway>,
    pub metrics: RequestMetrics,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecord {
    pub id: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct RecordBody {
    pub id: String,
    pub key: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

/// Gateway error with its HTTP status.
pub struct ApiError(SealgateError);

impl From<SealgateError> for ApiError {
    fn from(e: SealgateError) -> Self {
        Self(e)
    }
}

impl From<hex::FromHexError> for ApiError {
    fn from(e: hex::FromHexError) -> Self {
        Self(SealgateError::Decode(e))
    }
}

fn status_for(e: &SealgateError) -> StatusCode {
    match e {
        SealgateError::MalformedRequest | SealgateError::Decode(_) => StatusCode::BAD_REQUEST,
        SealgateError::Backend(BackendError::NotFound) => StatusCode::NOT_FOUND,
        SealgateError::Authentication
        | SealgateError::MalformedEnvelope { .. }
        | SealgateError::InvalidKeySize(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SealgateError::Backend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        tracing::warn!(status = status.as_u16(), error = %self.0, "http request failed");
        let body = ErrorBody {
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/records", post(create_record))
        .route("/records/{id}", get(get_record).delete(delete_record))
        .with_state(state)
}

/// Serve the REST front end on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: HttpState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("http server: {e}"))
}

async fn create_record(
    State(state): State<HttpState>,
    body: Result<Json<CreateRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordBody>), ApiError> {
    let start = Instant::now();
    let result = store(&state.gateway, body).await;
    state.metrics.observe("STORE", result.is_ok(), start.elapsed());
    result.map(|record| (StatusCode::CREATED, Json(record)))
}

async fn store(
    gateway: &Gateway,
    body: Result<Json<CreateRecord>, JsonRejection>,
) -> Result<RecordBody, ApiError> {
    let Json(body) = body.map_err(|_| SealgateError::MalformedRequest)?;
    let id = hex::decode(&body.id)?;
    let data = hex::decode(&body.data)?;
    let key = gateway.store_record(&id, &data).await?;
    Ok(RecordBody {
        id: body.id,
        key: key.to_hex(),
        data: body.data,
    })
}

async fn get_record(
    State(state): State<HttpState>,
    Path(id_hex): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<RecordBody>, ApiError> {
    let start = Instant::now();
    let result = retrieve(&state.gateway, id_hex, query.key).await;
    state.metrics.observe("RETRIEVE", result.is_ok(), start.elapsed());
    result.map(Json)
}

async fn retrieve(
    gateway: &Gateway,
    id_hex: String,
    key_hex: Option<String>,
) -> Result<RecordBody, ApiError> {
    let key_hex = key_hex.ok_or(SealgateError::MalformedRequest)?;
    let id = hex::decode(&id_hex)?;
    let key = hex::decode(&key_hex)?;
    let record = gateway.retrieve_record(&id, &key).await?;
    Ok(RecordBody {
        id: id_hex,
        key: key_hex,
        data: hex::encode(record),
    })
}

async fn delete_record(
    State(state): State<HttpState>,
    Path(id_hex): Path<String>,
) -> Result<StatusCode, ApiError> {
    let start = Instant::now();
    let result = delete(&state.gateway, &id_hex).await;
    state.metrics.observe("DELETE", result.is_ok(), start.elapsed());
    result.map(|()| StatusCode::ACCEPTED)
}

async fn delete(gateway: &Gateway, id_hex: &str) -> Result<(), ApiError> {
    let id = hex::decode(id_hex)?;
    gateway.delete_record(&id).await?;
    Ok(())
}
