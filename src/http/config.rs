//! Per-request response handling options.

use crate::base::neterror::NetError;
use http::header::LOCATION;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Decides whether a response head is acceptable.
pub type StatusValidator =
    Arc<dyn Fn(StatusCode, &HeaderMap) -> Result<(), NetError> + Send + Sync + 'static>;

/// The default validator: only `200 OK` passes.
///
/// Failures carry the status and, when present, the `location` header so
/// callers can follow redirects themselves.
pub fn require_ok(status: StatusCode, headers: &HeaderMap) -> Result<(), NetError> {
    if status == StatusCode::OK {
        return Ok(());
    }
    Err(NetError::BadStatus {
        status: status.as_u16(),
        location: headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    })
}

/// What to do with a transport error reporting a malformed status line
/// after some bytes were already parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedStatusPolicy {
    /// Ignore it; a usable response may still arrive.
    #[default]
    Tolerate,
    /// Fail the request like any other transport error.
    Reject,
}

/// How a response is validated and delivered.
#[derive(Clone)]
pub struct ResponseConfig {
    validate_status: Option<StatusValidator>,
    binary: bool,
    stream: bool,
    malformed_status: MalformedStatusPolicy,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            validate_status: Some(Arc::new(require_ok)),
            binary: false,
            stream: false,
            malformed_status: MalformedStatusPolicy::default(),
        }
    }
}

impl fmt::Debug for ResponseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseConfig")
            .field("validate_status", &self.validate_status.is_some())
            .field("binary", &self.binary)
            .field("stream", &self.stream)
            .field("malformed_status", &self.malformed_status)
            .finish()
    }
}

impl ResponseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the status validator.
    pub fn validate_status<F>(mut self, validator: F) -> Self
    where
        F: Fn(StatusCode, &HeaderMap) -> Result<(), NetError> + Send + Sync + 'static,
    {
        self.validate_status = Some(Arc::new(validator));
        self
    }

    /// Accept every status code.
    pub fn without_status_validation(mut self) -> Self {
        self.validate_status = None;
        self
    }

    /// Deliver raw bytes instead of UTF-8 text.
    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Resolve with the open body instead of buffering it.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn malformed_status(mut self, policy: MalformedStatusPolicy) -> Self {
        self.malformed_status = policy;
        self
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn malformed_status_policy(&self) -> MalformedStatusPolicy {
        self.malformed_status
    }

    /// Run the configured validator, if any.
    pub fn check_status(&self, status: StatusCode, headers: &HeaderMap) -> Result<(), NetError> {
        match &self.validate_status {
            Some(validate) => validate(status, headers),
            None => Ok(()),
        }
    }
}
