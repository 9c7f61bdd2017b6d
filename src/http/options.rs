//! Request options and their normalization.
//!
//! A request target is either a URL or an already structured
//! [`RequestOptions`]. [`normalize`] turns both into canonical options whose
//! header keys are lower-cased, one entry per logical header.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::OrderedHeaderMap;
use http::Method;
use url::Url;

/// Transport-level description of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub method: Method,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    /// Path plus query string, always starting with `/`.
    pub path: String,
    /// `user:password` taken from URL userinfo.
    pub auth: Option<String>,
    pub headers: OrderedHeaderMap,
    /// The body is written incrementally and has no declared length.
    pub streamed_body: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: None,
            path: "/".to_string(),
            auth: None,
            headers: OrderedHeaderMap::new(),
            streamed_body: false,
        }
    }
}

impl RequestOptions {
    /// Parse a URL into options. The parser's message is kept as-is on error.
    pub fn parse(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|e| NetError::InvalidUrl(e.to_string()))?;
        Self::from_url(&url)
    }

    pub fn from_url(url: &Url) -> Result<Self, NetError> {
        let host = url
            .host_str()
            .ok_or_else(|| NetError::InvalidUrl(format!("{url} has no host")))?;

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let auth = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            let user = percent_encoding::percent_decode_str(url.username()).decode_utf8_lossy();
            let password = url
                .password()
                .map(|p| percent_encoding::percent_decode_str(p).decode_utf8_lossy())
                .unwrap_or_default();
            Some(format!("{user}:{password}"))
        };

        Ok(Self {
            method: Method::GET,
            scheme: url.scheme().to_string(),
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: url.port(),
            path,
            auth,
            headers: OrderedHeaderMap::new(),
            streamed_body: false,
        })
    }

    /// Set the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header, ignoring it if name or value is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.headers.insert(name, value).is_err() {
            tracing::debug!(header = name, "dropping invalid header");
        }
        self
    }

    /// Replace the header map from arbitrary pairs.
    pub fn headers<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.headers = OrderedHeaderMap::from_pairs_lossy(pairs);
        self
    }

    /// The port to connect to, falling back to the scheme's default.
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or(match self.scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        })
    }

    /// `host[:port]`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Reassemble the request URL (without credentials).
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.path)
    }
}

/// Anything that can name a request: a URL or structured options.
#[derive(Debug, Clone)]
pub enum Target {
    Url(String),
    Options(RequestOptions),
}

impl From<&str> for Target {
    fn from(url: &str) -> Self {
        Target::Url(url.to_string())
    }
}

impl From<String> for Target {
    fn from(url: String) -> Self {
        Target::Url(url)
    }
}

impl From<&String> for Target {
    fn from(url: &String) -> Self {
        Target::Url(url.clone())
    }
}

impl From<Url> for Target {
    fn from(url: Url) -> Self {
        Target::Url(url.into())
    }
}

impl From<RequestOptions> for Target {
    fn from(options: RequestOptions) -> Self {
        Target::Options(options)
    }
}

/// Produce canonical options for a target.
pub fn normalize(target: Target) -> Result<RequestOptions, NetError> {
    match target {
        Target::Url(url) => RequestOptions::parse(&url),
        // OrderedHeaderMap keys are lower-case and unique by construction.
        Target::Options(options) => Ok(options),
    }
}
