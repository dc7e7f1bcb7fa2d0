//! # Response Envelope
//!
//! Every response leaving the routes, successful or not, has the same JSON shape:
//!
//! ```json
//! {
//!   "message": "people – Records found",
//!   "data": [...],
//!   "code": 200,
//!   "success": true,
//!   "error": false,
//!   "completed_at": "2024-01-31 17:05:09"
//! }
//! ```
//!
//! `success` is true only for 200 and 201. Faults are rendered by
//! [`ApiError`](crate::errors::ApiError), which clamps their status into `200..=599`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::outcome::Outcome;

/// Format of `completed_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub message: String,
    #[schema(value_type = Object)]
    pub data: Value,
    pub code: u16,
    pub success: bool,
    pub error: bool,
    pub completed_at: String,
}

impl Envelope {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, data: Value) -> Self {
        let success = matches!(status, StatusCode::OK | StatusCode::CREATED);
        Self {
            message: message.into(),
            data,
            code: status.as_u16(),
            success,
            error: !success,
            completed_at: timestamp(),
        }
    }

    /// Wraps an operation outcome, serializing its payload.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Serialization` if the payload cannot be turned into JSON.
    pub fn from_outcome<T: Serialize>(outcome: Outcome<T>) -> Result<Self, ApiError> {
        let data = serde_json::to_value(&outcome.data).map_err(ApiError::serialization)?;
        Ok(Self::new(outcome.status, outcome.message, data))
    }

    /// The 400 response sent when a request lacks the resource's key identifier.
    #[must_use]
    pub fn missing_key(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, Value::Bool(false))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Renders an outcome, falling back to the error responder if it cannot be serialized.
pub fn respond<T: Serialize>(outcome: Outcome<T>) -> Response {
    match Envelope::from_outcome(outcome) {
        Ok(envelope) => envelope.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Maps a fault's status into the valid response range: anything outside `200..=599`
/// becomes 500.
#[must_use]
pub fn clamp_status(code: i64) -> StatusCode {
    u16::try_from(code)
        .ok()
        .filter(|code| (200..=599).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Local time, formatted for `completed_at`.
#[must_use]
pub fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}
