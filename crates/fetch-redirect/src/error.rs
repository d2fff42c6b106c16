//! Errors surfaced to proxy clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A request the proxy could not complete.
///
/// Each variant maps to one status code; the body is the display text.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("missing target host")]
    MissingHost,

    #[error("CONNECT tunneling is not supported")]
    ConnectUnsupported,

    #[error("failed to read request body: {0}")]
    ReadBody(String),

    #[error("request loop detected")]
    LoopDetected,

    #[error("upstream timeout")]
    UpstreamTimeout,

    #[error("upstream connection error")]
    UpstreamConnection,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingHost | ProxyError::ReadBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::ConnectUnsupported => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::LoopDetected => StatusCode::LOOP_DETECTED,
            ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamConnection => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
