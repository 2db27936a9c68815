//! Conversions from domain errors to HTTP responses.
//!
//! These involve axum types and belong in the adapters layer.

use crate::domain::ApiError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{kinds, BridgeError};

    #[test]
    fn test_timeout_renders_504() {
        let err: ApiError = BridgeError::CallbackTimeout {
            callback_id: crate::domain::CallbackId::new(),
            deadline: std::time::Duration::from_secs(1),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_out_of_range_status_falls_back_to_500() {
        let response = ApiError::new(42, kinds::NOT_FOUND, "bogus").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
