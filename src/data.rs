use serde::Serialize;
use serde_json::{Map, Value};
use url::{Host, ParseError, Url};

/// Key of the alert field pointing back to the alert's origin.
pub const EXTERNAL_URL_KEY: &str = "externalURL";

/// Payload of a forwarded event: the decoded alert, or the raw body when it is
/// not a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Structured(Map<String, Value>),
    Raw(String),
}

impl Event {
    pub fn from_body(body: &[u8]) -> Event {
        match serde_json::from_slice::<Map<String, Value>>(body) {
            Ok(alert) => Event::Structured(alert),
            Err(_) => Event::Raw(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

/// Returns the host name and the path (without leading slashes) of the
/// event's `externalURL`. Relative references only yield a path.
pub fn extract_host_and_source(event: &Event) -> (Option<String>, Option<String>) {
    let raw = match event {
        Event::Structured(alert) => match alert.get(EXTERNAL_URL_KEY).and_then(Value::as_str) {
            Some(raw) => raw,
            None => return (None, None),
        },
        Event::Raw(_) => return (None, None),
    };

    let (host, path) = match Url::parse(raw) {
        Ok(url) => (url_host(&url), url.path().to_owned()),
        Err(ParseError::RelativeUrlWithoutBase) if raw.starts_with("//") => {
            match Url::parse(&format!("http:{}", raw)) {
                Ok(url) => (url_host(&url), url.path().to_owned()),
                Err(_) => return (None, None),
            }
        }
        Err(ParseError::RelativeUrlWithoutBase) => (None, relative_path(raw).to_owned()),
        Err(_) => return (None, None),
    };

    let source = path.trim_start_matches('/');
    let source = if source.is_empty() { None } else { Some(source.to_owned()) };
    (host, source)
}

fn url_host(url: &Url) -> Option<String> {
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_owned(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    if host.is_empty() { None } else { Some(host) }
}

/// Path of a relative reference: everything before the query or fragment.
fn relative_path(raw: &str) -> &str {
    raw.split(|c: char| c == '?' || c == '#').next().unwrap_or_default()
}

/// Static tags attached to every forwarded event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    pub sourcetype: String,
    pub index: Option<String>,
}

/// Event as accepted by a HEC-style ingestion endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub sourcetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    pub event: Event,
}

impl Envelope {
    pub fn wrap(event: Event, metadata: &EventMetadata) -> Envelope {
        let (host, source) = extract_host_and_source(&event);
        Envelope {
            time: None,
            host,
            source,
            sourcetype: metadata.sourcetype.clone(),
            index: metadata.index.clone(),
            event,
        }
    }
}
