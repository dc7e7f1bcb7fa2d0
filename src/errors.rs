//! # Error Handling
//!
//! Faults never escape the HTTP layer as raw errors. Every [`ApiError`] renders as the
//! standard [`Envelope`](crate::envelope::Envelope) with `success=false`, `error=true`
//! and a status clamped into `200..=599`.
//!
//! Internal details (database messages, serializer errors) are logged through `tracing`
//! and replaced with a generic description before they reach the client:
//!
//! ```json
//! {
//!   "message": "A database error occurred",
//!   "data": {"kind": "database", "detail": "A database error occurred"},
//!   "code": 500,
//!   ...
//! }
//! ```
//!
//! Save and delete faults are recovered inside the repository instead: the transaction is
//! rolled back, the fault is logged, and the operation reports [`ApiError::fault_status`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::{Value, json};
use std::fmt;

use crate::envelope::{Envelope, clamp_status};

#[derive(Debug)]
pub enum ApiError {
    /// 400 - The request body does not carry the resource's key identifier
    MissingKey {
        message: String,
    },

    /// 404 - Resource doesn't exist
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 400 - Invalid input from user
    BadRequest {
        message: String,
    },

    /// 500 - Store fault outside a transaction (details logged, not exposed)
    Database {
        message: String,
        internal: DbErr,
    },

    /// 400 - Store fault while saving or deleting (details logged, not exposed)
    Persistence {
        internal: DbErr,
    },

    /// 500 - A payload could not be converted to or from JSON
    Serialization {
        internal: String,
    },

    /// Fault carrying its own status code
    Custom {
        status: StatusCode,
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    pub fn missing_key(message: impl Into<String>) -> Self {
        Self::MissingKey {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a 500 error from a database fault. The fault itself is logged, never sent.
    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    #[must_use]
    pub fn persistence(err: DbErr) -> Self {
        Self::Persistence { internal: err }
    }

    pub fn serialization(err: impl fmt::Display) -> Self {
        Self::Serialization {
            internal: err.to_string(),
        }
    }

    /// Create an error with an explicit status code
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::custom(StatusCode::CONFLICT, "Pet already adopted", None));
    /// ```
    pub fn custom(
        status: StatusCode,
        message: impl Into<String>,
        internal: Option<String>,
    ) -> Self {
        Self::Custom {
            status,
            message: message.into(),
            internal,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingKey { .. } | Self::BadRequest { .. } | Self::Persistence { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Database { .. } | Self::Serialization { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Custom { status, .. } => *status,
        }
    }

    /// Status reported when this fault aborts a save or delete: the fault's own code when
    /// it carries one (clamped), 400 otherwise.
    #[must_use]
    pub fn fault_status(&self) -> StatusCode {
        match self {
            Self::Custom { status, .. } => clamp_status(i64::from(status.as_u16())),
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::MissingKey { message }
            | Self::BadRequest { message }
            | Self::Database { message, .. }
            | Self::Custom { message, .. } => message.clone(),
            Self::Persistence { .. } => "The entry could not be saved".to_string(),
            Self::Serialization { .. } => "The response could not be encoded".to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::MissingKey { .. } => "missing_key",
            Self::NotFound { .. } => "not_found",
            Self::BadRequest { .. } => "bad_request",
            Self::Database { .. } => "database",
            Self::Persistence { .. } => "persistence",
            Self::Serialization { .. } => "serialization",
            Self::Custom { .. } => "custom",
        }
    }

    /// The sanitized fault object sent as an error envelope's `data`.
    #[must_use]
    pub fn fault_body(&self) -> Value {
        json!({
            "kind": self.kind(),
            "detail": self.user_message(),
        })
    }

    /// Log the fault. Internal details only ever go to the log.
    pub fn log(&self) {
        match self {
            Self::Database { internal, .. } | Self::Persistence { internal } => {
                tracing::error!(
                    kind = self.kind(),
                    error = ?internal,
                    "Database error occurred"
                );
            }
            Self::Serialization { internal } => {
                tracing::error!(details = %internal, "Serialization error occurred");
            }
            Self::Custom {
                internal: Some(details),
                status,
                ..
            } => {
                tracing::error!(
                    status = %status,
                    details = %details,
                    "Custom error occurred"
                );
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let envelope = match &self {
            Self::MissingKey { message } => Envelope::missing_key(message.clone()),
            _ => Envelope::new(
                clamp_status(i64::from(self.status_code().as_u16())),
                self.user_message(),
                self.fault_body(),
            ),
        };

        envelope.into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// `DbErr::RecordNotFound` becomes 404; every other store fault becomes a 500.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::NotFound {
                    resource: resource.to_string(),
                    id: None,
                }
            }
            _ => Self::database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_with_id() {
        let err = ApiError::not_found("person", Some("999".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.user_message(), "person with ID '999' not found");
    }

    #[test]
    fn test_missing_key_is_400() {
        let err = ApiError::missing_key("Please provide the request key identifier.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Please provide the request key identifier.");
    }

    #[test]
    fn test_database_error_is_sanitized() {
        let err = ApiError::database(DbErr::Type("column secret_hash mismatch".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.user_message(), "A database error occurred");
        assert!(!err.fault_body().to_string().contains("secret_hash"));
    }

    #[test]
    fn test_persistence_fault_status_defaults_to_400() {
        let err = ApiError::persistence(DbErr::Custom("constraint failed".to_string()));
        assert_eq!(err.fault_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::bad_request("bad").fault_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::database(DbErr::Custom("x".to_string())).fault_status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_fault_status_uses_explicit_code_clamped() {
        let conflict = ApiError::custom(StatusCode::CONFLICT, "taken", None);
        assert_eq!(conflict.fault_status(), StatusCode::CONFLICT);

        let informational = ApiError::custom(StatusCode::CONTINUE, "odd", None);
        assert_eq!(informational.fault_status(), StatusCode::INTERNAL_SERVER_ERROR);

        let beyond = ApiError::custom(StatusCode::from_u16(799).unwrap(), "odd", None);
        assert_eq!(beyond.fault_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_record_not_found_conversion() {
        let api_err: ApiError = DbErr::RecordNotFound("person not found".to_string()).into();
        assert_eq!(api_err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(api_err.user_message(), "person not found");
    }

    #[test]
    fn test_other_dberr_become_500() {
        for db_err in [
            DbErr::Custom("Any custom error".to_string()),
            DbErr::Type("Type error".to_string()),
            DbErr::Json("JSON error".to_string()),
        ] {
            let api_err: ApiError = db_err.into();
            assert_eq!(api_err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(api_err.user_message(), "A database error occurred");
        }
    }

    #[test]
    fn test_response_clamps_out_of_range_status() {
        let response =
            ApiError::custom(StatusCode::SWITCHING_PROTOCOLS, "odd", None).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::custom(StatusCode::IM_A_TEAPOT, "teapot", None).into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn test_fault_body_shape() {
        let body = ApiError::bad_request("Unknown filter field 'secret'").fault_body();
        assert_eq!(body["kind"], "bad_request");
        assert_eq!(body["detail"], "Unknown filter field 'secret'");
    }
}
