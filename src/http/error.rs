use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::AvailabilityError;

use super::views::ConflictView;

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    /// Unreadable request: bad JSON, path or query parameter.
    BadRequest(String),
    Domain(AvailabilityError),
}

impl From<AvailabilityError> for ApiError {
    fn from(e: AvailabilityError) -> Self {
        ApiError::Domain(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ApiError::Domain(e) => write!(f, "{e}"),
        }
    }
}

pub fn status_code(e: &AvailabilityError) -> StatusCode {
    match e {
        AvailabilityError::InvalidRange(_)
        | AvailabilityError::OverlapConflict { .. }
        | AvailabilityError::InvalidSeason(_)
        | AvailabilityError::SeasonOverlap(_)
        | AvailabilityError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
        AvailabilityError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AvailabilityError::PropertyNotFound(_)
        | AvailabilityError::RangeNotFound(_)
        | AvailabilityError::SeasonNotFound(_) => StatusCode::NOT_FOUND,
        AvailabilityError::AlreadyExists(_) => StatusCode::CONFLICT,
        AvailabilityError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "status": false, "message": msg })),
            )
                .into_response(),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": false, "message": msg })),
            )
                .into_response(),
            ApiError::Domain(AvailabilityError::Storage(detail)) => {
                tracing::error!("storage failure: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": false, "message": "internal storage error" })),
                )
                    .into_response()
            }
            ApiError::Domain(e) => {
                let status = status_code(&e);
                let body = match &e {
                    AvailabilityError::OverlapConflict { conflicts, .. } => json!({
                        "status": false,
                        "message": e.to_string(),
                        "conflicts": conflicts.iter().map(ConflictView::from).collect::<Vec<_>>(),
                    }),
                    _ => json!({ "status": false, "message": e.to_string() }),
                };
                (status, Json(body)).into_response()
            }
        }
    }
}
