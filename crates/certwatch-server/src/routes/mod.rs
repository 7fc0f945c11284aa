//! HTTP route handlers.

pub mod hook;
pub mod matches;
pub mod rules;
pub mod system;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use certwatch_types::CertwatchError;

/// Wrapper mapping [`CertwatchError`] onto HTTP responses.
///
/// Every handler returns `Result<_, ApiError>`; the admin surface gets
/// precise per-operation statuses while store failures collapse to 500.
pub struct ApiError(pub CertwatchError);

impl From<CertwatchError> for ApiError {
    fn from(e: CertwatchError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CertwatchError::BadRequest(_)
            | CertwatchError::EmptyExpression
            | CertwatchError::ParseError(_)
            | CertwatchError::InvalidRule { .. }
            | CertwatchError::NoKeywords => StatusCode::BAD_REQUEST,
            CertwatchError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            CertwatchError::RuleNotFound(_) => StatusCode::NOT_FOUND,
            CertwatchError::DuplicateRule(_) => StatusCode::CONFLICT,
            CertwatchError::StoreError(_) | CertwatchError::BusFull => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
