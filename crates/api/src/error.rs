//! API error types with HTTP response mapping.

use application::{ApplicationError, Failure};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{ErrorCode, ErrorKind};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A command or query was rejected or failed below the HTTP layer.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// Malformed headers, path segments or query parameters.
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

fn rejection_status(failure: &Failure) -> StatusCode {
    if failure.code.is_not_found() {
        return StatusCode::NOT_FOUND;
    }
    match (failure.code, failure.kind()) {
        (ErrorCode::ValidationFailed, _) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, ErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::BusinessRule) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidInput.as_str(),
                message,
            ),
            ApiError::Application(ApplicationError::Rejected(failure)) => {
                (rejection_status(&failure), failure.code.as_str(), failure.message)
            }
            ApiError::Application(ApplicationError::Store(err)) => match err {
                StoreError::ConcurrencyConflict { .. } => (
                    StatusCode::CONFLICT,
                    ErrorCode::ConcurrencyConflict.as_str(),
                    err.to_string(),
                ),
                StoreError::Duplicate { .. } => (
                    StatusCode::CONFLICT,
                    ErrorCode::AlreadyExists.as_str(),
                    err.to_string(),
                ),
                other => {
                    tracing::error!(error = %other, "internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "internal server error".to_string(),
                    )
                }
            },
        };

        (status, axum::Json(ErrorBody { code, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Version;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn rejections_map_by_code() {
        let cases = [
            (ErrorCode::InventoryNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::OriginalSaleNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::ValidationFailed, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorCode::InvalidQuantity, StatusCode::BAD_REQUEST),
            (ErrorCode::InsufficientStock, StatusCode::CONFLICT),
            (ErrorCode::OpeningBalanceExists, StatusCode::CONFLICT),
        ];
        for (code, expected) in cases {
            let error = ApiError::from(ApplicationError::rejected(code, "x"));
            assert_eq!(status_of(error), expected, "{code}");
        }
    }

    #[test]
    fn store_faults_are_hidden() {
        let error = ApiError::from(ApplicationError::Store(StoreError::Unavailable(
            "connection refused".into(),
        )));
        assert_eq!(status_of(error), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn conflicts_are_409() {
        let error = ApiError::from(ApplicationError::Store(StoreError::ConcurrencyConflict {
            aggregate_type: "InventoryItem",
            id: "x".into(),
            expected: Version::new(1),
            actual: Version::new(2),
        }));
        assert_eq!(status_of(error), StatusCode::CONFLICT);
    }
}
