use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::model::{Envelope, RouteData, RouteSummary, Status};
use crate::resolver::Resolver;
use crate::text;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type Reply<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/routes", get(list_routes))
        .route("/routes/{query}", get(get_route))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(resolver)
}

async fn list_routes(State(resolver): State<Arc<Resolver>>) -> Reply<Vec<RouteSummary>> {
    reply(resolver.list_all().await?)
}

/// `query` arrives percent-decoded; it is capitalized before lookup.
async fn get_route(
    State(resolver): State<Arc<Resolver>>,
    Path(query): Path<String>,
) -> Reply<Vec<RouteData>> {
    let query = text::capitalize(&query);
    reply(resolver.resolve(&query).await?)
}

async fn health() -> &'static str {
    "OK"
}

fn reply<T: Serialize>(envelope: Envelope<T>) -> Reply<T> {
    match envelope.status() {
        Status::Success => Ok(Json(envelope)),
        Status::NotFound => Err(ApiError::NotFound(envelope.message().to_string())),
    }
}
