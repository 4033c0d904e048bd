//! Orders API: error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders_core::error::{ConfigError, TransportError};
use orders_runtime::telemetry::TelemetryError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The queue could not be reached at startup.
    #[error("queue error: {0}")]
    Transport(#[from] TransportError),

    /// Tracing could not be initialised.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `TransportError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub TransportError);

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            TransportError::Unreachable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "queue_unavailable")
            }
            TransportError::Rejected(_) => (StatusCode::BAD_GATEWAY, "queue_rejected"),
            TransportError::LockLost(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transport_error")
            }
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn status_of(err: TransportError) -> StatusCode {
        let response = ApiError(err).into_response();
        response.status()
    }

    #[test]
    fn test_unreachable_maps_to_503() {
        assert_eq!(
            status_of(TransportError::Unreachable("connection refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_rejected_maps_to_502() {
        assert_eq!(
            status_of(TransportError::Rejected("quota exceeded".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_lock_lost_maps_to_500() {
        assert_eq!(
            status_of(TransportError::LockLost(Uuid::new_v4())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
