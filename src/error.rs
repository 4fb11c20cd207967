use std::time::Duration;

use bytes::Bytes;
use hyper::{Body, Response, StatusCode};
use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Faults that stop a request from being relayed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read request: {0}")]
    BodyRead(#[source] hyper::Error),

    #[error("failed to marshal envelope: {0}")]
    EnvelopeSerialization(#[source] serde_json::Error),

    #[error("failed to build destination request: {0}")]
    Request(#[source] hyper::http::Error),

    #[error("failed to send request to destination: {0}")]
    Outbound(#[source] hyper::Error),

    #[error("destination did not answer within {0:?}")]
    Timeout(Duration),

    /// The destination answered but its body could not be read to the end.
    /// `body` holds what arrived before the failure.
    #[error("failed to read destination response ({status}): {source}")]
    PartialResponse { status: StatusCode, body: Bytes, source: BoxError },
}

impl RelayError {
    pub fn into_response(self) -> Response<Body> {
        if matches!(self, RelayError::Outbound(_) | RelayError::Timeout(_)) {
            let message = format!("Something went wrong:\n\n{}\n", self);
            return respond(StatusCode::SERVICE_UNAVAILABLE, Body::from(message));
        }
        match self {
            RelayError::PartialResponse { status, body, .. } => respond(status, Body::from(body)),
            _ => respond(StatusCode::SERVICE_UNAVAILABLE, Body::empty()),
        }
    }
}

pub(crate) fn respond(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("invalid destination URL {url:?}: {reason}")]
    Destination { url: String, reason: String },

    #[error("destination token is not a valid header value")]
    Token,

    #[error("cannot resolve listening address {0}")]
    ListenAddress(String),

    #[error("failed to configure TLS: {0}")]
    Tls(#[from] native_tls::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_reports_message() {
        let response = RelayError::Timeout(Duration::from_secs(5)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], &b"Something went wrong:\n\ndestination did not answer within 5s\n"[..]);
    }

    #[tokio::test]
    async fn partial_response_keeps_status_and_bytes() {
        let source = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "stream aborted");
        let response = RelayError::PartialResponse {
            status: StatusCode::BAD_GATEWAY,
            body: Bytes::from_static(b"partial"),
            source: source.into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], &b"partial"[..]);
    }

    #[tokio::test]
    async fn local_fault_has_empty_body() {
        let error = serde_json::from_str::<u8>("x").unwrap_err();
        let response = RelayError::EnvelopeSerialization(error).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(body.is_empty());
    }
}
