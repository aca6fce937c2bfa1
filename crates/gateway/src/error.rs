//! Mapping from domain errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use murmur_core::error::{BackendError, Error};
use serde::Serialize;

/// Gateway-level error that maps onto an HTTP status.
#[derive(Debug)]
pub enum GatewayError {
    /// A domain error from the pipeline or stores.
    Core(Error),
    /// A malformed request the domain never saw (bad query params etc.).
    Validation(String),
}

impl From<Error> for GatewayError {
    fn from(e: Error) -> Self {
        GatewayError::Core(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::Core(Error::InvalidPayload(msg)) => {
                (StatusCode::BAD_REQUEST, format!("Invalid payload: {msg}"))
            }
            GatewayError::Core(Error::Backend(BackendError::Timeout { .. })) => {
                (StatusCode::GATEWAY_TIMEOUT, self_message(&self))
            }
            GatewayError::Core(Error::Backend(_)) => (StatusCode::BAD_GATEWAY, self_message(&self)),
            GatewayError::Core(_) => (StatusCode::INTERNAL_SERVER_ERROR, self_message(&self)),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "Request failed");
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn self_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Core(e) => e.to_string(),
        GatewayError::Validation(msg) => msg.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: GatewayError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn invalid_payload_is_client_error() {
        let err = GatewayError::Core(Error::InvalidPayload("empty".into()));
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_timeout_is_gateway_timeout() {
        let err = GatewayError::Core(Error::Backend(BackendError::Timeout { timeout_secs: 30 }));
        assert_eq!(status_of(err), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn backend_unreachable_is_bad_gateway() {
        let err = GatewayError::Core(Error::Backend(BackendError::Unavailable(
            "refused".into(),
        )));
        assert_eq!(status_of(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn store_error_is_internal() {
        let err = GatewayError::Core(Error::Store(
            murmur_core::error::StoreError::Storage("disk full".into()),
        ));
        assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_is_client_error() {
        assert_eq!(
            status_of(GatewayError::Validation("'end' is required".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
