//! HTTP request handlers
//!
//! Implements the liveness, health, version and conversion endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::convert::{ConversionRequest, ConversionResult, SourceFormat};
use crate::error::ConvertError;
use crate::state::AppState;

/// JSON error body: `{success: false, message, detail?}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::ToolUnavailable => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "The ffmpeg transcoder is not available on this server.",
            )
            .with_detail("Install ffmpeg on the PATH or set FFMPEG_PATH, then restart the server."),
            ConvertError::Validation(e) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            e if e.is_transcoder_failure() => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Transcoding failed.")
                    .with_detail(e.to_string())
            }
            e => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error, please try again later.",
            )
            .with_detail(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::new(
            status,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    }
}

/// Successful conversion body
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub result: ConversionResult,
}

/// Liveness probe
/// GET /
pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": format!("audio-convert-server is running on port {}.", state.config.port),
    }))
}

/// Transcoder health
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let transcoder = state.transcoder();
    if !transcoder.is_available() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "transcoder": null,
                "message": "ffmpeg not found; set FFMPEG_PATH or add it to PATH",
            })),
        )
            .into_response();
    }

    Json(serde_json::json!({
        "status": "ok",
        "transcoder": {
            "path": transcoder.binary().map(|p| p.to_string_lossy()),
            "version": transcoder.version(),
        },
    }))
    .into_response()
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("audio-convert-server v", env!("CARGO_PKG_VERSION"))
}

type ConvertFuture = Pin<Box<dyn Future<Output = Result<Json<ConvertResponse>, ApiError>> + Send>>;

/// Build the handler for `POST /convert/{format}-to-mp3`
pub fn convert_handler(
    format: SourceFormat,
) -> impl Fn(State<Arc<AppState>>, Result<Json<ConversionRequest>, JsonRejection>) -> ConvertFuture
       + Clone
       + Send
       + Sync
       + 'static {
    move |State(state): State<Arc<AppState>>,
          body: Result<Json<ConversionRequest>, JsonRejection>|
          -> ConvertFuture { Box::pin(convert(state, format, body)) }
}

async fn convert(
    state: Arc<AppState>,
    format: SourceFormat,
    body: Result<Json<ConversionRequest>, JsonRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let Json(request) = body?;

    let result = state
        .converter
        .convert(request, format)
        .await
        .map_err(|e| {
            if !matches!(e, ConvertError::Validation(_)) {
                tracing::error!("{} conversion failed: {}", format, e);
            }
            ApiError::from(e)
        })?;

    Ok(Json(ConvertResponse {
        success: true,
        message: "Conversion succeeded.".to_string(),
        result,
    }))
}
