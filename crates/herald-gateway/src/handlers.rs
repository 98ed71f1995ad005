// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway API.

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use herald_core::{ChatTarget, HeraldError, RelayTask};

use crate::fetch::is_http_url;
use crate::server::GatewayState;

/// The `photo` form field, resolved to bytes before enqueueing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoInput {
    /// An uploaded file.
    Upload(Bytes),
    /// An `http(s)://` URL to download.
    Url(String),
}

impl PhotoInput {
    /// Interprets a textual `photo` value. Blank means no photo.
    pub fn from_text(value: &str) -> Result<Option<Self>, ApiError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        if is_http_url(value) {
            Ok(Some(PhotoInput::Url(value.to_string())))
        } else {
            Err(ApiError::bad_request(
                "photo must be an uploaded file or an http(s) URL",
            ))
        }
    }
}

/// Where the photo bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhotoSource {
    #[serde(rename = "URL")]
    Url,
    #[serde(rename = "upload")]
    Upload,
}

/// Fields of a `POST /api/send` submission, whatever the body encoding.
#[derive(Debug, Default)]
pub struct SendRequest {
    pub chat_id: Option<String>,
    pub text: Option<String>,
    pub photo: Option<PhotoInput>,
}

/// `application/x-www-form-urlencoded` body. Cannot carry file uploads.
#[derive(Debug, Default, Deserialize)]
pub struct UrlEncodedSend {
    pub chat_id: Option<String>,
    pub text: Option<String>,
    pub photo: Option<String>,
}

impl TryFrom<UrlEncodedSend> for SendRequest {
    type Error = ApiError;

    fn try_from(form: UrlEncodedSend) -> Result<Self, ApiError> {
        let photo = match form.photo.as_deref() {
            Some(value) => PhotoInput::from_text(value)?,
            None => None,
        };
        Ok(Self {
            chat_id: form.chat_id,
            text: form.text,
            photo,
        })
    }
}

/// Response body for an accepted submission.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub status: &'static str,
    pub message: String,
    pub chat_id: ChatTarget,
    pub queue_size: usize,
    pub has_text: bool,
    pub has_photo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_source: Option<PhotoSource>,
}

/// Response body for `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, `degraded` (some accounts down) or `unavailable` (all down).
    pub status: &'static str,
    pub connected_clients: usize,
    pub total_clients: usize,
    /// Tasks waiting for the worker. The one being sent is not counted.
    pub queue_size: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    /// Error description.
    pub error: String,
}

/// A rejected request: status code plus message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<HeraldError> for ApiError {
    fn from(err: HeraldError) -> Self {
        match err {
            HeraldError::Validation(_)
            | HeraldError::InvalidDestination(_)
            | HeraldError::Fetch { .. }
            | HeraldError::Timeout { .. } => ApiError::bad_request(err.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "send request failed");
        } else {
            debug!(status = %self.status, error = %self.message, "send request rejected");
        }
        (
            self.status,
            Json(ErrorResponse {
                status: "error",
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// POST /api/send
///
/// Accepts `multipart/form-data` or `application/x-www-form-urlencoded`,
/// resolves the photo, and enqueues an inline relay task.
pub async fn post_send(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Json<SendResponse>, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let form = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?;
        read_multipart(multipart).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(form) = Form::<UrlEncodedSend>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("invalid form body: {e}")))?;
        SendRequest::try_from(form)?
    } else {
        return Err(ApiError::bad_request(
            "expected multipart/form-data or application/x-www-form-urlencoded",
        ));
    };

    enqueue_send(&state, form).await.map(Json)
}

/// Collects the known fields of a multipart body. Unknown fields are skipped.
async fn read_multipart(mut multipart: Multipart) -> Result<SendRequest, ApiError> {
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("invalid multipart body: {e}"))
    };

    let mut form = SendRequest::default();
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chat_id" => form.chat_id = Some(field.text().await.map_err(malformed)?),
            "text" => form.text = Some(field.text().await.map_err(malformed)?),
            "photo" if field.file_name().is_some() => {
                let data = field.bytes().await.map_err(malformed)?;
                form.photo = (!data.is_empty()).then_some(PhotoInput::Upload(data));
            }
            "photo" => {
                let value = field.text().await.map_err(malformed)?;
                form.photo = PhotoInput::from_text(&value)?;
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(form)
}

/// Validates a submission, resolves its photo and enqueues it.
pub async fn enqueue_send(
    state: &GatewayState,
    form: SendRequest,
) -> Result<SendResponse, ApiError> {
    let chat_id = form
        .chat_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("chat_id is required"))?;
    let destination: ChatTarget = chat_id.parse()?;

    let text = form.text.filter(|t| !t.trim().is_empty());
    let (photo, photo_source) = match form.photo {
        None => (None, None),
        Some(PhotoInput::Upload(data)) => (Some(data), Some(PhotoSource::Upload)),
        Some(PhotoInput::Url(url)) => {
            let data = state.fetcher.fetch(&url).await.map_err(|e| {
                ApiError::bad_request(format!("failed to fetch photo from {url}: {e}"))
            })?;
            (Some(data), Some(PhotoSource::Url))
        }
    };

    let has_text = text.is_some();
    let photo_size = photo.as_ref().map(Bytes::len);
    let task = RelayTask::inline(destination.clone(), text, photo)
        .map_err(|_| ApiError::bad_request("text or photo is required"))?;
    let queue_size = state.engine.enqueue(task)?;

    info!(
        chat_id = %destination,
        has_text,
        photo_size,
        queue_size,
        "send request queued"
    );

    Ok(SendResponse {
        status: "success",
        message: format!("message queued for {destination}"),
        chat_id: destination,
        queue_size,
        has_text,
        has_photo: photo_size.is_some(),
        photo_size,
        photo_source,
    })
}

/// GET /api/health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let pool = state.engine.pool();
    let total_clients = pool.count();
    let connected_clients = pool.connected_count();
    let status = match connected_clients {
        0 => "unavailable",
        n if n < total_clients => "degraded",
        _ => "ok",
    };
    Json(HealthResponse {
        status,
        connected_clients,
        total_clients,
        queue_size: state.engine.queue_len(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when the recorder is disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                status: "error",
                error: "metrics are disabled".to_string(),
            }),
        )
            .into_response(),
    }
}
