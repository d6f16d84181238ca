//! HTTP rendering of [`AppError`].
//!
//! Every error becomes a `{error, status}` JSON body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Status code an error maps to at the HTTP surface.
pub fn status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NoSearchTerms | AppError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        AppError::RefreshInProgress => StatusCode::CONFLICT,
        AppError::CollaboratorUnavailable(_) | AppError::Network { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert_eq!(status_code(&AppError::NoSearchTerms), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_code(&AppError::invalid_query("top")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_code(&AppError::RefreshInProgress), StatusCode::CONFLICT);
    }

    #[test]
    fn test_internal_errors() {
        assert_eq!(
            status_code(&AppError::config("bad")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
