use std::sync::Arc;

use hyper::{Body, Request, Response};
use log::{debug, error};

use crate::config::Config;
use crate::data::{Envelope, Event, EventMetadata};
use crate::error::{ConfigError, RelayError};
use crate::forwarder::Forwarder;

/// Turns every inbound alert into one event posted to the ingestion endpoint,
/// and answers with whatever the endpoint answered.
#[derive(Clone)]
pub struct Relay {
    metadata: Arc<EventMetadata>,
    forwarder: Arc<Forwarder>,
}

impl Relay {
    pub fn new(config: &Config) -> Result<Relay, ConfigError> {
        Ok(Relay {
            metadata: Arc::new(config.metadata.clone()),
            forwarder: Arc::new(Forwarder::new(config)?),
        })
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        debug!("New request: {} {}", req.method(), req.uri());
        let response = match self.relay(req).await {
            Ok(response) => response,
            Err(err) => {
                error!("Relay to {} failed: {}", self.forwarder.destination(), err);
                err.into_response()
            }
        };
        debug!("End of request");
        response
    }

    async fn relay(&self, req: Request<Body>) -> Result<Response<Body>, RelayError> {
        let body = hyper::body::to_bytes(req.into_body())
            .await
            .map_err(RelayError::BodyRead)?;

        let envelope = Envelope::wrap(Event::from_body(&body), &self.metadata);
        let payload = serde_json::to_vec(&envelope).map_err(RelayError::EnvelopeSerialization)?;

        let reply = self.forwarder.forward(payload).await?;
        debug!("Destination response status code: {}", reply.status);
        Ok(reply.into_response())
    }
}
