use std::ffi::OsString;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{crate_version, value_t, App, Arg, ArgMatches};
use hyper::Uri;
use tokio::net::lookup_host;
use url::Url;

use crate::data::EventMetadata;
use crate::error::ConfigError;

pub const DEFAULT_PORT: &str = "44553";
pub const DEFAULT_SOURCETYPE: &str = "alertmanager";

/// Process-wide settings, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub verbosity: u64,
    pub address: String,
    pub port: u16,
    pub destination: Uri,
    pub token: String,
    pub metadata: EventMetadata,
    /// Overall time budget of one outbound call, `None` when unlimited.
    pub request_timeout: Option<Duration>,
    pub dial_timeout: Option<Duration>,
    pub tls_handshake_timeout: Option<Duration>,
    pub insecure: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("verbosity", &self.verbosity)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("destination", &self.destination)
            .field("token", &"<redacted>")
            .field("metadata", &self.metadata)
            .field("request_timeout", &self.request_timeout)
            .field("dial_timeout", &self.dial_timeout)
            .field("tls_handshake_timeout", &self.tls_handshake_timeout)
            .field("insecure", &self.insecure)
            .finish()
    }
}

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("hecrelay")
        .version(crate_version!())
        .about("Relays alert notifications to an HTTP event collector")
        .arg(Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .multiple(true)
            .help("Show verbose debug information"))
        .arg(Arg::with_name("address")
            .short("a")
            .long("address")
            .value_name("ADDRESS")
            .env("HECRELAY_LISTENING_ADDRESS")
            .default_value("127.0.0.1")
            .help("Listening address"))
        .arg(Arg::with_name("port")
            .short("p")
            .long("port")
            .value_name("PORT")
            .env("HECRELAY_LISTENING_PORT")
            .default_value(DEFAULT_PORT)
            .help("Listening port"))
        .arg(Arg::with_name("hec-url")
            .short("u")
            .long("hec-url")
            .value_name("URL")
            .env("HECRELAY_HEC_URL")
            .required(true)
            .help("Event collector endpoint"))
        .arg(Arg::with_name("hec-token")
            .short("t")
            .long("hec-token")
            .value_name("TOKEN")
            .env("HECRELAY_HEC_TOKEN")
            .hide_env_values(true)
            .required(true)
            .help("Event collector token"))
        .arg(Arg::with_name("hec-index")
            .short("i")
            .long("hec-index")
            .value_name("INDEX")
            .env("HECRELAY_HEC_INDEX")
            .help("Index of forwarded events"))
        .arg(Arg::with_name("hec-sourcetype")
            .short("s")
            .long("hec-sourcetype")
            .value_name("SOURCETYPE")
            .env("HECRELAY_HEC_SOURCETYPE")
            .empty_values(false)
            .default_value(DEFAULT_SOURCETYPE)
            .help("Sourcetype of forwarded events"))
        .arg(Arg::with_name("hec-timeout")
            .short("n")
            .long("hec-timeout")
            .value_name("SECONDS")
            .env("HECRELAY_HEC_TIMEOUT")
            .default_value("5")
            .help("Event collector request timeout, 0 disables it"))
        .arg(Arg::with_name("dial-timeout")
            .long("dial-timeout")
            .value_name("SECONDS")
            .env("HECRELAY_DIAL_TIMEOUT")
            .default_value("30")
            .help("Event collector connect timeout, 0 disables it"))
        .arg(Arg::with_name("tls-handshake-timeout")
            .long("tls-handshake-timeout")
            .value_name("SECONDS")
            .env("HECRELAY_TLS_HANDSHAKE_TIMEOUT")
            .default_value("10")
            .help("Event collector TLS handshake timeout, 0 disables it"))
        .arg(Arg::with_name("insecure")
            .short("k")
            .long("insecure")
            .help("Do not check the event collector TLS certificate"))
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = cli().get_matches_from_safe(args)?;
        Config::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Config, ConfigError> {
        let index = matches.value_of("hec-index")
            .filter(|index| !index.is_empty())
            .map(str::to_owned);
        Ok(Config {
            verbosity: matches.occurrences_of("verbose"),
            address: matches.value_of("address").unwrap_or_default().to_owned(),
            port: value_t!(matches, "port", u16)?,
            destination: parse_destination(matches.value_of("hec-url").unwrap_or_default())?,
            token: matches.value_of("hec-token").unwrap_or_default().to_owned(),
            metadata: EventMetadata {
                sourcetype: matches.value_of("hec-sourcetype").unwrap_or(DEFAULT_SOURCETYPE).to_owned(),
                index,
            },
            request_timeout: seconds(value_t!(matches, "hec-timeout", u64)?),
            dial_timeout: seconds(value_t!(matches, "dial-timeout", u64)?),
            tls_handshake_timeout: seconds(value_t!(matches, "tls-handshake-timeout", u64)?),
            insecure: matches.is_present("insecure"),
        })
    }

    pub async fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let unresolved = || ConfigError::ListenAddress(format!("{}:{}", self.address, self.port));
        lookup_host((self.address.as_str(), self.port))
            .await
            .map_err(|_| unresolved())?
            .next()
            .ok_or_else(unresolved)
    }
}

fn seconds(value: u64) -> Option<Duration> {
    if value == 0 { None } else { Some(Duration::from_secs(value)) }
}

fn parse_destination(raw: &str) -> Result<Uri, ConfigError> {
    let invalid = |reason: String| ConfigError::Destination { url: raw.to_owned(), reason };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {}", other))),
    }
    url.as_str().parse::<Uri>().map_err(|e| invalid(e.to_string()))
}
