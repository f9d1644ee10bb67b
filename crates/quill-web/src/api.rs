//! HTTP endpoint handlers.
//!
//! `POST /deepseek/chat` answers with a JSON [`ApiResponse`] envelope,
//! `POST /deepseek/streamChat` with an SSE stream driven by
//! [`relay_stream`](crate::relay::relay_stream), and `GET /user` sits behind
//! the [`require_bearer`] middleware.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response};
use quill_rs::{Completions, RelayError, Sampling, TemplateKind, build_prompt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::form::GenerationForm;
use crate::relay;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Completions>,
    pub auth_token: Option<Arc<str>>,
    pub stream_buffer: usize,
}

/// Response envelope for every JSON endpoint.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// A [`RelayError`] rendered as a failure envelope.
///
/// Validation errors answer 400; everything else answers 500.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            warn!("Rejected request: {}", self.0);
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {:?}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(ApiResponse::<()>::failure(self.0.to_string()))).into_response()
    }
}

/// POST /deepseek/chat: generate Markdown articles in one response.
///
/// Returns 200 with `data` set to the generated text, 400 for an invalid
/// body, 500 if the upstream call fails.
pub async fn post_chat(
    State(app): State<AppState>,
    form: GenerationForm,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let GenerationForm { request, history } = form;
    info!(
        "Document generation: model={}, num={}, source_chars={}",
        request.model_id,
        request.num,
        request.text.chars().count()
    );

    let prompt = build_prompt(&request, TemplateKind::Document);
    let text = app
        .backend
        .complete(&prompt, &history, &request.model_id, Sampling::default())
        .await?;

    info!("Document generation finished: {} chars", text.chars().count());
    Ok(Json(ApiResponse::ok(text)))
}

/// POST /deepseek/streamChat: generate plain text as an SSE stream.
///
/// An invalid body is rejected with a JSON 400 before the stream opens.
/// After that the response is always 200; upstream failures arrive as an
/// `error` frame.
pub async fn post_stream_chat(State(app): State<AppState>, form: GenerationForm) -> Response {
    let GenerationForm { request, history } = form;
    info!(
        "Streaming generation: model={}, num={}, source_chars={}",
        request.model_id,
        request.num,
        request.text.chars().count()
    );

    let prompt = build_prompt(&request, TemplateKind::Stream);
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(app.stream_buffer.max(1));

    tokio::spawn(relay::relay_stream(
        app.backend.clone(),
        prompt,
        history,
        request.model_id,
        tx,
    ));

    relay::sse_response(rx)
}

/// Body of a successful `GET /user`.
#[derive(Serialize, Debug)]
pub struct UserInfo {
    pub authenticated: bool,
}

/// GET /user: report the caller's session. Only reachable with a valid
/// bearer token.
pub async fn get_user() -> Json<ApiResponse<UserInfo>> {
    Json(ApiResponse::ok(UserInfo {
        authenticated: true,
    }))
}

/// Reject requests whose `Authorization: Bearer` token does not match the
/// configured one. With no token configured, every request is rejected.
pub async fn require_bearer(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let authorized = match app.auth_token.as_deref() {
        Some(expected) => req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token.trim() == expected),
        None => false,
    };

    if authorized {
        return next.run(req).await;
    }

    warn!("Unauthorized request to {}", req.uri().path());
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::failure("unauthorized")),
    )
        .into_response()
}
