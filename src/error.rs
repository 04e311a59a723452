use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

// Startup problems. Any of these stops the process before it binds a port.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one service must be configured")]
    NoServices,
    #[error("service `{0}` has no instances")]
    EmptyInstances(String),
    #[error("service `{0}` is configured more than once")]
    DuplicateService(String),
    #[error("service `{0}` has no circuit breaker")]
    UnknownService(String),
    #[error("invalid service spec `{0}`, expected NAME=ADDR[,ADDR...]")]
    InvalidServiceSpec(String),
    #[error("instance address `{0}` is not a usable http url")]
    InvalidAddress(String),
    #[error("`{0}` must be greater than zero")]
    NonPositive(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// Failure to encode the prometheus text exposition
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("metrics output is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// Per-request failures. The dispatcher always resolves a request to either a
// response or one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("service `{service}` is unavailable (circuit open)")]
    BackendUnavailable { service: String },
    #[error("transport failure calling `{service}`: {reason}")]
    BackendTransportFailure { service: String, reason: String },
    #[error("call to `{service}` timed out")]
    BackendTimeout { service: String },
    #[error("backend responded with status {status}")]
    BackendApplicationError { status: u16, body: Value },
    #[error("unknown service `{0}`")]
    UnknownService(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::BackendUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::BackendTransportFailure { .. } => StatusCode::BAD_GATEWAY,
            DispatchError::BackendTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            DispatchError::BackendApplicationError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            DispatchError::UnknownService(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            // forwarded verbatim, the gateway does not reinterpret application errors
            DispatchError::BackendApplicationError { body, .. } => body,
            DispatchError::BackendUnavailable { .. } => json!({ "error": "Service Unavailable" }),
            DispatchError::BackendTransportFailure { .. } => json!({ "error": "Bad Gateway" }),
            DispatchError::BackendTimeout { .. } => json!({ "error": "Request Timeout" }),
            DispatchError::UnknownService(_) => json!({ "error": "Unknown service" }),
        };
        (status, Json(body)).into_response()
    }
}
