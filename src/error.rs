use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::remote::RemoteError;
use crate::validation::FieldErrors;

/// Where every guard denial sends the caller.
pub const UNAUTHENTICATED_ENTRY: &str = "/access/login";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Missing session, dead credential or wrong role.
    Unauthenticated,
    Validation(FieldErrors),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Remote(RemoteError),
    /// Cancel half of an update went through, the create half did not.
    PartialUpdate { cancelled_id: i64, reason: String },
}

impl ApiError {
    pub fn slot_conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict("SLOT_CONFLICT", message.into())
    }

    pub fn appointment_not_found(id: i64) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("appointment {id} not found"))
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                fields: None,
                redirect: None,
            },
        })
    }
}

impl From<FieldErrors> for ApiError {
    fn from(fields: FieldErrors) -> Self {
        ApiError::Validation(fields)
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        ApiError::Remote(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => {
                let body = Json(ErrorResponse {
                    error: ErrorObject {
                        code: "UNAUTHENTICATED".into(),
                        message: "Sign in to continue".into(),
                        fields: None,
                        redirect: Some(UNAUTHENTICATED_ENTRY.into()),
                    },
                });
                (
                    StatusCode::SEE_OTHER,
                    [(header::LOCATION, UNAUTHENTICATED_ENTRY)],
                    body,
                )
                    .into_response()
            }
            ApiError::Validation(fields) => {
                let body = Json(ErrorResponse {
                    error: ErrorObject {
                        code: "VALIDATION_ERROR".into(),
                        message: "Some fields are missing or invalid".into(),
                        fields: Some(fields),
                        redirect: None,
                    },
                });
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Remote(RemoteError::Rejected { status, message }) => {
                // 4xx passes through, anything else is a gateway error.
                let status = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, ApiError::to_error_response("REMOTE_REJECTED", &message)).into_response()
            }
            ApiError::Remote(other) => {
                tracing::warn!(error = %other, "clinic API unreachable or unreadable");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError::to_error_response(
                        "UPSTREAM_UNAVAILABLE",
                        "Could not reach the clinic service. Try again.",
                    ),
                )
                    .into_response()
            }
            ApiError::PartialUpdate { cancelled_id, reason } => (
                StatusCode::BAD_GATEWAY,
                ApiError::to_error_response(
                    "UPDATE_PARTIAL_FAILURE",
                    &format!(
                        "appointment {cancelled_id} was cancelled but its replacement could not be created: {reason}"
                    ),
                ),
            )
                .into_response(),
        }
    }
}
