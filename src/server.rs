//! HTTP surface
//!
//! A single endpoint wraps the resolver:
//!
//! `GET /api/{api_version}/key?id={id}` returns
//! `{"id":"<id>","key":"<base64>"}`. A missing or empty `id` is a 400,
//! any resolver failure a 500, both with
//! `{"error_type":"...","error_message":"..."}` bodies.

use crate::cancel::CancelToken;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::resolver::Rkms;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Body of a successful key response
#[derive(Debug, Serialize)]
pub struct GetKeyResponse {
    pub id: String,
    pub key: String,
}

/// Body of an error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
struct KeyParams {
    id: Option<String>,
}

/// Builds the service router for the given API version.
pub fn router(rkms: Arc<Rkms>, api_version: &str) -> Router {
    Router::new()
        .route(&format!("/api/{}/key", api_version), get(get_key))
        .with_state(rkms)
}

async fn get_key(
    State(rkms): State<Arc<Rkms>>,
    Query(params): Query<KeyParams>,
) -> Response {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error_type: "BadRequest".to_string(),
                error_message: "id query parameter is required".to_string(),
            }),
        )
            .into_response();
    };

    let ctx = CancelToken::new();
    match rkms.get_plaintext_data_key(&ctx, &id).await {
        Ok(key) => {
            log::debug!("resolved data key for {}", id);
            (StatusCode::OK, Json(GetKeyResponse { id, key })).into_response()
        }
        Err(e) => {
            log::error!("failed to resolve data key for {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error_type: "InternalServerError".to_string(),
                    error_message: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Serves the router until a shutdown signal arrives.
pub async fn serve(rkms: Arc<Rkms>, config: &ServerConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(rkms, &config.api_version);

    log::info!(
        "listening on {} (GET /api/{}/key)",
        addr,
        config.api_version
    );

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    log::info!("shutdown signal received");
}
