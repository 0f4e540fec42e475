//! API error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use generation::GenerationError;

/// Wrapper turning pipeline errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub GenerationError);

impl From<GenerationError> for ApiError {
    fn from(error: GenerationError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GenerationError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            GenerationError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            GenerationError::NotReady => StatusCode::NOT_FOUND,
            GenerationError::AlreadyTerminal { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal server error");
        }

        let body = Json(json!({
            "detail": self.0.to_string(),
            "code": self.0.code(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_for(error: GenerationError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(GenerationError::InvalidRequest {
                reason: "bad".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(GenerationError::JobNotFound { job_id: "x".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(GenerationError::NotReady), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(GenerationError::AlreadyTerminal { job_id: "x".into() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(GenerationError::NoUsableContent),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
