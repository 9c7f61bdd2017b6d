//! HTTP responses: what the transport delivers and what a request resolves to.

use crate::base::neterror::NetError;
use crate::http::requestbody::ByteStream;
use crate::http::responsebody::ResponseStream;
use bytes::Bytes;
use futures::TryStreamExt;
use http::{HeaderMap, StatusCode, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use std::fmt;
use std::ops::Deref;

/// A response as handed over by a transport: head plus an open body.
pub struct IncomingResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: ByteStream,
}

impl fmt::Debug for IncomingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingResponse")
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl IncomingResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
            body,
        }
    }

    /// Create from hyper Response<Incoming>.
    pub fn from_hyper(resp: http::Response<Incoming>) -> Self {
        let (parts, body) = resp.into_parts();
        let body = TryStreamExt::map_err(BodyExt::into_data_stream(body), |e: hyper::Error| NetError::from(&e));
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body: Box::pin(body),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Discard the response, closing its body.
    pub fn close(self) {
        drop(self);
    }

    pub(crate) fn into_parts(self) -> (StatusCode, Version, HeaderMap, ByteStream) {
        (self.status, self.version, self.headers, self.body)
    }
}

/// A fully read body together with the response head.
///
/// Derefs to the body, so a `Buffered<String>` reads like a string that
/// also carries its headers.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffered<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: T,
}

impl<T> Buffered<T> {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: T) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn into_body(self) -> T {
        self.body
    }
}

impl<T> Deref for Buffered<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.body
    }
}

/// What a request resolves to.
#[derive(Debug)]
pub enum Response {
    /// Buffered body decoded as UTF-8 (`binary: false, stream: false`).
    Text(Buffered<String>),
    /// Buffered raw body (`binary: true, stream: false`).
    Binary(Buffered<Bytes>),
    /// Open body handle (`stream: true`); the caller owns it.
    Stream(ResponseStream),
}

impl Response {
    pub fn status(&self) -> StatusCode {
        match self {
            Response::Text(b) => b.status(),
            Response::Binary(b) => b.status(),
            Response::Stream(s) => s.status(),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match self {
            Response::Text(b) => b.headers(),
            Response::Binary(b) => b.headers(),
            Response::Stream(s) => s.headers(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Response::Text(b) => Some(b.as_str()),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Response::Binary(b) => Some(&b.body),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<Buffered<String>> {
        match self {
            Response::Text(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_binary(self) -> Option<Buffered<Bytes>> {
        match self {
            Response::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<ResponseStream> {
        match self {
            Response::Stream(s) => Some(s),
            _ => None,
        }
    }
}
