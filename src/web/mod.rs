//! HTTP surface: JSON gallery API and the HTML viewer page.
//!
//! - `GET  /`                                  : viewer page
//! - `GET  /health`                            : liveness
//! - `POST /api/v1/camera/capture`             : capture (and by default save) a frame
//! - `GET  /api/v1/camera/stream`              : one live frame, not saved
//! - `GET  /api/v1/camera/images`              : paginated listing
//! - `GET  /api/v1/camera/images/:name`        : image bytes
//! - `DELETE /api/v1/camera/images/:name`      : delete
//! - `POST /api/v1/camera/images/:name/rename` : relabel
//! - `GET  /api/v1/device/status`              : camera reachability

mod page;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::cam::{CameraClient, DeviceStatus};
use crate::error::{GatewayError, Result};
use crate::gallery::{Gallery, ImageFile, MAX_LIMIT, MIN_LIMIT};
use crate::naming;
use crate::notify::{CaptureEvent, Notifier};

const DEFAULT_LIMIT: i64 = 50;

/// Shared state for all handlers.
pub struct AppState {
    pub gallery:     Gallery,
    pub camera:      CameraClient,
    pub notifier:    Notifier,
    pub environment: String,
}

/// Build the full application router.
pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route("/camera/capture", post(capture))
        .route("/camera/stream", get(stream))
        .route("/camera/images", get(list_images))
        .route("/camera/images/:filename", get(get_image).delete(delete_image))
        .route("/camera/images/:filename/rename", post(rename_image))
        .route("/device/status", get(device_status));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn start(state: Arc<AppState>, bind: SocketAddr, cors_origins: &[String]) -> anyhow::Result<()> {
    let app = router(state, cors_origins);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind to {bind}"))?;

    info!("gateway listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("web server error")?;

    info!("gateway stopped");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin {o:?}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested");
}

// ── Errors ────────────────────────────────────────────────────────────────────

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::NotFound(_)         => StatusCode::NOT_FOUND,
            GatewayError::InvalidArgument(_)  => StatusCode::BAD_REQUEST,
            GatewayError::Timeout(_)          => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BadStatus(_)        => StatusCode::BAD_GATEWAY,
            GatewayError::WebhookStatus(_)    => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) | GatewayError::Http(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() && !self.is_upstream() {
            error!("request failed: {self}");
        }
        let body = json!({
            "success": false,
            "error":   self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

fn bad_query(e: QueryRejection) -> GatewayError {
    GatewayError::InvalidArgument(e.body_text())
}

// ── Camera ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CaptureParams {
    label: Option<String>,
    save:  Option<bool>,
}

#[derive(Debug, Serialize)]
struct CaptureResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filepath: Option<String>,
    size_bytes: u64,
    timestamp:  String,
    message:    String,
}

/// POST /api/v1/camera/capture?label=..&save=..
async fn capture(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<CaptureParams>, QueryRejection>,
) -> Result<Json<CaptureResponse>> {
    let Query(params) = params.map_err(bad_query)?;
    let label = params.label.as_deref();

    if !params.save.unwrap_or(true) {
        let bytes = state.camera.capture().await?;
        return Ok(Json(CaptureResponse {
            success:    true,
            filename:   None,
            filepath:   None,
            size_bytes: bytes.len() as u64,
            timestamp:  naming::stamp(&Local::now().naive_local()),
            message:    "Image captured (not saved)".to_string(),
        }));
    }

    let captured = state.gallery.capture(&state.camera, label).await?;
    let timestamp = naming::stamp(&captured.taken_at);
    state
        .notifier
        .spawn(CaptureEvent::new(&captured.file, timestamp.clone(), label));

    Ok(Json(CaptureResponse {
        success:    true,
        filename:   Some(captured.file.filename),
        filepath:   Some(captured.file.filepath),
        size_bytes: captured.file.size_bytes,
        timestamp,
        message:    "Image captured successfully".to_string(),
    }))
}

/// GET /api/v1/camera/stream: fresh frame straight from the camera.
async fn stream(State(state): State<Arc<AppState>>) -> Result<Response> {
    let bytes = state.camera.capture().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/v1/device/status: always 200; see `online`.
async fn device_status(State(state): State<Arc<AppState>>) -> Json<DeviceStatus> {
    Json(state.camera.probe().await)
}

// ── Gallery ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListParams {
    limit:  Option<i64>,
    offset: Option<i64>,
}

/// GET /api/v1/camera/images?limit=..&offset=..
async fn list_images(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ImageFile>>> {
    let Query(params) = params.map_err(bad_query)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = params.offset.unwrap_or(0);

    if limit < MIN_LIMIT as i64 || limit > MAX_LIMIT as i64 {
        return Err(GatewayError::InvalidArgument(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
        )));
    }
    if offset < 0 {
        return Err(GatewayError::InvalidArgument(format!(
            "offset must not be negative, got {offset}"
        )));
    }

    let page = state.gallery.list(limit as usize, offset as usize).await?;
    Ok(Json(page))
}

/// GET /api/v1/camera/images/:filename
async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let bytes = state.gallery.get(&filename).await?;
    let mime = if filename.ends_with(".png") { "image/png" } else { "image/jpeg" };
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// DELETE /api/v1/camera/images/:filename
async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.gallery.delete(&filename).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Image {filename} deleted successfully"),
    })))
}

#[derive(Debug, Deserialize)]
struct RenameParams {
    new_label: Option<String>,
}

/// POST /api/v1/camera/images/:filename/rename?new_label=..
async fn rename_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    params: std::result::Result<Query<RenameParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>> {
    let Query(params) = params.map_err(bad_query)?;
    let new_label = params
        .new_label
        .ok_or_else(|| GatewayError::InvalidArgument("new_label is required".into()))?;

    let new_filename = state.gallery.rename(&filename, &new_label).await?;
    Ok(Json(json!({
        "success":      true,
        "old_filename": filename,
        "new_filename": new_filename,
        "message":      "Image renamed successfully",
    })))
}

// ── Misc ──────────────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status":      "healthy",
        "version":     env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
    }))
}

/// GET /: gallery page, every image newest first.
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let total = state.gallery.count().await?;
    let mut images = Vec::with_capacity(total);
    while images.len() < total {
        let page = state.gallery.list(MAX_LIMIT, images.len()).await?;
        if page.is_empty() {
            break;
        }
        images.extend(page);
    }
    Ok(Html(page::render(&images, state.camera.host())))
}
