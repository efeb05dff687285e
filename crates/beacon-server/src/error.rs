use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use beacon_shared::ValidationError;
use beacon_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::NotAuthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            ServerError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Store error".to_string())
            }
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
