//! Request body extraction and validation for the generation endpoints.
//!
//! Bodies may be JSON or `application/x-www-form-urlencoded`. Every field is
//! deserialized as optional so a missing one is reported by name, then
//! [`RawGenerationRequest::validate`] turns the raw body into a
//! [`GenerationRequest`]. Nothing reaches the upstream until that succeeds.

use axum::Json;
use axum::extract::{Form, FromRequest, Request};
use axum::http::header;
use quill_rs::{GenerationRequest, Message, RelayError};
use serde::Deserialize;

use crate::api::ApiError;

/// `num` as sent by JSON clients (a number) or form clients (a string).
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NumField {
    Int(i64),
    Text(String),
}

/// Request body before validation.
#[derive(Deserialize, Debug, Default)]
pub struct RawGenerationRequest {
    pub model_id: Option<String>,
    pub text: Option<String>,
    pub channels: Option<String>,
    pub direction: Option<String>,
    pub requirements: Option<String>,
    pub num: Option<NumField>,
    pub seo_keywords: Option<String>,
    pub scope: Option<String>,
    /// Earlier turns to send ahead of the prompt. JSON bodies only.
    #[serde(default)]
    pub history: Vec<Message>,
}

fn required(field: &str, value: Option<String>) -> Result<String, RelayError> {
    value.ok_or_else(|| RelayError::Validation(format!("missing field `{field}`")))
}

fn non_blank(field: &str, value: Option<String>) -> Result<String, RelayError> {
    let value = required(field, value)?;
    if value.trim().is_empty() {
        return Err(RelayError::Validation(format!(
            "field `{field}` must not be empty"
        )));
    }
    Ok(value)
}

fn positive(field: &str, value: Option<NumField>) -> Result<u32, RelayError> {
    let invalid = || RelayError::Validation(format!("field `{field}` must be a positive integer"));
    let n = match value {
        None => return Err(RelayError::Validation(format!("missing field `{field}`"))),
        Some(NumField::Int(n)) => n,
        Some(NumField::Text(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
    };
    u32::try_from(n)
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(invalid)
}

impl RawGenerationRequest {
    /// Check every field and build the validated request plus its history.
    pub fn validate(self) -> Result<(GenerationRequest, Vec<Message>), RelayError> {
        let request = GenerationRequest {
            model_id: non_blank("model_id", self.model_id)?,
            text: non_blank("text", self.text)?,
            channels: non_blank("channels", self.channels)?,
            direction: non_blank("direction", self.direction)?,
            requirements: non_blank("requirements", self.requirements)?,
            num: positive("num", self.num)?,
            seo_keywords: non_blank("seo_keywords", self.seo_keywords)?,
            scope: non_blank("scope", self.scope)?,
        };
        Ok((request, self.history))
    }
}

/// Extractor yielding a validated generation request.
#[derive(Debug)]
pub struct GenerationForm {
    pub request: GenerationRequest,
    pub history: Vec<Message>,
}

fn is_form_encoded(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

impl<S> FromRequest<S> for GenerationForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let raw = if is_form_encoded(&req) {
            Form::<RawGenerationRequest>::from_request(req, state)
                .await
                .map_err(|e| RelayError::Validation(e.body_text()))?
                .0
        } else {
            Json::<RawGenerationRequest>::from_request(req, state)
                .await
                .map_err(|e| RelayError::Validation(e.body_text()))?
                .0
        };

        let (request, history) = raw.validate()?;
        Ok(Self { request, history })
    }
}
