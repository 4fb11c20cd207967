use std::time::Duration;

use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::header::{HeaderValue, AUTHORIZATION};
use hyper::{Body, Request, Response, StatusCode, Uri};
use tokio::time::{self, Instant};

use crate::config::Config;
use crate::connector::{build_client, HttpsClient};
use crate::error::{respond, BoxError, ConfigError, RelayError};

/// Answer of the ingestion endpoint, relayed verbatim to the caller.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Reply {
    pub fn into_response(self) -> Response<Body> {
        respond(self.status, Body::from(self.body))
    }
}

/// Posts envelopes to the ingestion endpoint, one attempt each.
pub struct Forwarder {
    client: HttpsClient,
    destination: Uri,
    authorization: HeaderValue,
    timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(config: &Config) -> Result<Forwarder, ConfigError> {
        let mut authorization = HeaderValue::from_str(&format!("Splunk {}", config.token))
            .map_err(|_| ConfigError::Token)?;
        authorization.set_sensitive(true);
        Ok(Forwarder {
            client: build_client(config)?,
            destination: config.destination.clone(),
            authorization,
            timeout: config.request_timeout,
        })
    }

    /// Sends one envelope. The overall timeout is a single deadline shared by
    /// sending the request and reading the response body; once the status is
    /// known, a failed or late body still yields the status and the bytes read.
    pub async fn forward(&self, payload: Vec<u8>) -> Result<Reply, RelayError> {
        let request = Request::post(self.destination.clone())
            .header(AUTHORIZATION, self.authorization.clone())
            .body(Body::from(payload))
            .map_err(RelayError::Request)?;
        let deadline = self.timeout.map(|limit| (Instant::now() + limit, limit));

        let sending = self.client.request(request);
        let response = match deadline {
            Some((at, limit)) => time::timeout_at(at, sending)
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => sending.await,
        }
        .map_err(RelayError::Outbound)?;

        let status = response.status();
        let mut body = response.into_body();
        let mut collected = BytesMut::new();
        let read: Result<(), BoxError> = match deadline {
            Some((at, _)) => match time::timeout_at(at, read_body(&mut body, &mut collected)).await {
                Ok(read) => read.map_err(Into::into),
                Err(elapsed) => Err(elapsed.into()),
            },
            None => read_body(&mut body, &mut collected).await.map_err(Into::into),
        };

        let body = collected.freeze();
        match read {
            Ok(()) => Ok(Reply { status, body }),
            Err(source) => Err(RelayError::PartialResponse { status, body, source }),
        }
    }

    pub fn destination(&self) -> &Uri {
        &self.destination
    }
}

async fn read_body(body: &mut Body, collected: &mut BytesMut) -> Result<(), hyper::Error> {
    while let Some(chunk) = body.data().await {
        collected.extend_from_slice(&chunk?);
    }
    Ok(())
}
