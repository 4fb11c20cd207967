use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;
use tokio::time;
use tower_service::Service;

use crate::config::Config;
use crate::error::{BoxError, ConfigError};

pub type HttpsClient = Client<TimeoutConnector<HttpsConnector<HttpConnector>>, Body>;

/// Bounds the time spent establishing a connection, TLS handshake included.
#[derive(Debug, Clone)]
pub struct TimeoutConnector<C> {
    inner: C,
    timeout: Option<Duration>,
}

impl<C> TimeoutConnector<C> {
    pub fn new(inner: C, timeout: Option<Duration>) -> Self {
        TimeoutConnector { inner, timeout }
    }
}

impl<C> Service<Uri> for TimeoutConnector<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Error: Into<BoxError> + 'static,
    C::Future: Send + 'static,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let connecting = self.inner.call(dst);
        let timeout = self.timeout;
        Box::pin(async move {
            let connected: Result<C::Response, BoxError> = match timeout {
                None => connecting.await.map_err(Into::into),
                Some(limit) => match time::timeout(limit, connecting).await {
                    Ok(connected) => connected.map_err(Into::into),
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connection not established within {:?}", limit),
                    ).into()),
                },
            };
            connected
        })
    }
}

/// Time allowed to dial and finish the TLS handshake. No limit when the
/// handshake is unbounded.
fn establish_timeout(config: &Config) -> Option<Duration> {
    let handshake = config.tls_handshake_timeout?;
    Some(config.dial_timeout.map_or(handshake, |dial| dial + handshake))
}

pub fn build_client(config: &Config) -> Result<HttpsClient, ConfigError> {
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(config.insecure)
        .danger_accept_invalid_hostnames(config.insecure)
        .build()?;

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(config.dial_timeout);

    let https = HttpsConnector::from((http, tokio_tls::TlsConnector::from(tls)));
    let connector = TimeoutConnector::new(https, establish_timeout(config));
    Ok(Client::builder().build::<_, Body>(connector))
}

#[cfg(test)]
mod tests {
    use std::future::{pending, Pending};

    use super::*;

    #[derive(Clone)]
    struct Stalled;

    impl Service<Uri> for Stalled {
        type Response = ();
        type Error = io::Error;
        type Future = Pending<Result<(), io::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _: Uri) -> Self::Future {
            pending()
        }
    }

    #[tokio::test]
    async fn stalled_connect_times_out() {
        let mut connector = TimeoutConnector::new(Stalled, Some(Duration::from_millis(50)));
        let err = connector.call(Uri::from_static("https://hec.example.com")).await.unwrap_err();
        let io_err = err.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn establish_timeout_adds_dial_and_handshake() {
        let mut config = Config::from_args(vec!["hecrelay", "-u", "https://hec", "-t", "x"]).unwrap();
        assert_eq!(establish_timeout(&config), Some(Duration::from_secs(40)));
        config.dial_timeout = None;
        assert_eq!(establish_timeout(&config), Some(Duration::from_secs(10)));
        config.tls_handshake_timeout = None;
        assert_eq!(establish_timeout(&config), None);
    }

    #[tokio::test]
    async fn builds_insecure_client() {
        let config = Config::from_args(vec!["hecrelay", "-u", "https://hec", "-t", "x", "-k"]).unwrap();
        assert!(build_client(&config).is_ok());
    }
}
