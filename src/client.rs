//! The HTTP request executor.
//!
//! Each virtual user owns a [`RequestExecutor`], and with it a private connection
//! pool and cookie jar, the way a real client would.

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use std::time::{Duration, Instant};
use std::{error, fmt, io};
use url::Url;

use crate::config::Configuration;
use crate::LoadTestError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The URL that was requested, after any redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    /// Time from sending the request until the body was fully read.
    pub latency: Duration,
}
impl HttpResponse {
    /// Returns true if the named header is present, regardless of its value.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }
}

/// Why a request did not produce an [`HttpResponse`].
#[derive(Debug)]
pub enum RequestError {
    /// The server could not be reached or stopped responding: connection refused,
    /// DNS failure, connection reset or timeout.
    Network(reqwest::Error),
    /// The server answered, but not with something usable: malformed response,
    /// undecodable body, too many redirects.
    Protocol(reqwest::Error),
    /// The URL could not be parsed.
    InvalidUrl {
        url: String,
        parse_error: url::ParseError,
    },
}
impl RequestError {
    fn describe(&self) -> &str {
        match *self {
            RequestError::Network(_) => "network error",
            RequestError::Protocol(_) => "protocol error",
            RequestError::InvalidUrl { .. } => "invalid url",
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, RequestError::Network(_))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestError::Network(source) | RequestError::Protocol(source) => {
                write!(f, "{}: {}", self.describe(), source)
            }
            RequestError::InvalidUrl { url, parse_error } => {
                write!(f, "{} `{}`: {}", self.describe(), url, parse_error)
            }
        }
    }
}

impl error::Error for RequestError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            RequestError::Network(source) | RequestError::Protocol(source) => Some(source),
            RequestError::InvalidUrl { parse_error, .. } => Some(parse_error),
        }
    }
}

/// Classify reqwest errors as network or protocol failures.
impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> RequestError {
        if err.is_timeout() || err.is_connect() || caused_by_io(&err) {
            RequestError::Network(err)
        } else {
            RequestError::Protocol(err)
        }
    }
}

// Connection resets and similar surface as an io::Error somewhere down the chain.
fn caused_by_io(err: &reqwest::Error) -> bool {
    let mut source = error::Error::source(err);
    while let Some(cause) = source {
        if cause.downcast_ref::<io::Error>().is_some() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Issues one HTTP request per call and measures how long it took.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
}
impl RequestExecutor {
    /// Build a client with the configured timeout, compression and certificate
    /// settings.
    pub fn new(configuration: &Configuration) -> Result<Self, LoadTestError> {
        let builder = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(configuration.request_timeout())
            .gzip(!configuration.no_gzip)
            .danger_accept_invalid_certs(configuration.accept_invalid_certs);

        // Each virtual user keeps its own cookies.
        #[cfg(feature = "cookies")]
        let builder = builder.cookie_store(true);

        Ok(RequestExecutor {
            client: builder.build()?,
        })
    }

    /// GET `url`, reading the whole body.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        let parsed = Url::parse(url).map_err(|parse_error| RequestError::InvalidUrl {
            url: url.to_string(),
            parse_error,
        })?;

        let started = Instant::now();
        let response = self.client.get(parsed).send().await?;
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let latency = started.elapsed();
        trace!("GET {}: {} in {:?}", url, status, latency);

        Ok(HttpResponse {
            url,
            status,
            headers,
            body,
            latency,
        })
    }
}
