use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection aborted")]
    ConnectionAborted,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Address unreachable")]
    AddressUnreachable,
    #[error("Timed out")]
    TimedOut,

    // Request setup
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Unknown URL scheme: {0}")]
    UnknownUrlScheme(String),
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Request body could not be serialized: {0}")]
    BodySerialization(String),
    #[error("No async runtime available to drive the request")]
    NoRuntime,
    #[error("Request already ended")]
    RequestEnded,

    // Body transfer
    #[error("Request body source failed: {0}")]
    BodySource(String),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("I/O error: {0}")]
    Io(String),

    // Response
    #[error("Malformed HTTP status line")]
    MalformedStatusLine { bytes_parsed: Option<usize> },
    #[error("Invalid HTTP response")]
    InvalidHttpResponse,
    #[error("Empty response")]
    EmptyResponse,
    #[error("HTTP response status code: {status}")]
    BadStatus {
        status: u16,
        location: Option<String>,
    },
    #[error("{0}")]
    Validation(String),

    #[error("Unknown error code: {0}")]
    Unknown(i32),
}

impl NetError {
    /// Stable numeric code, negative like Chromium's `net_error_list.h`.
    ///
    /// Codes below -10000 are local to this crate.
    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::ConnectionAborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::NameNotResolved => -105,
            NetError::AddressUnreachable => -109,
            NetError::ConnectionTimedOut => -118,
            NetError::TimedOut => -7,
            NetError::InvalidUrl(_) => -300,
            NetError::UnknownUrlScheme(_) => -302,
            NetError::InvalidHttpResponse => -320,
            NetError::EmptyResponse => -324,
            NetError::InvalidHeader => -10001,
            NetError::BodySerialization(_) => -10002,
            NetError::NoRuntime => -10003,
            NetError::RequestEnded => -10004,
            NetError::BodySource(_) => -10005,
            NetError::InvalidUtf8 => -10007,
            NetError::Io(_) => -10008,
            NetError::MalformedStatusLine { .. } => -10009,
            NetError::BadStatus { .. } => -10010,
            NetError::Validation(_) => -10011,
            NetError::Unknown(code) => *code,
        }
    }

    /// Status code attached by a status validator, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            NetError::BadStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Redirect target attached by a status validator, if the response had one.
    pub fn location(&self) -> Option<&str> {
        match self {
            NetError::BadStatus { location, .. } => location.as_deref(),
            _ => None,
        }
    }

    /// A malformed status line that still reported parsed bytes.
    ///
    /// The transport may have delivered a usable response anyway.
    pub fn is_benign_parse_error(&self) -> bool {
        matches!(
            self,
            NetError::MalformedStatusLine {
                bytes_parsed: Some(n)
            } if *n > 0
        )
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            ErrorKind::ConnectionReset => NetError::ConnectionReset,
            ErrorKind::ConnectionAborted => NetError::ConnectionAborted,
            ErrorKind::TimedOut => NetError::TimedOut,
            ErrorKind::AddrNotAvailable => NetError::AddressUnreachable,
            ErrorKind::UnexpectedEof => NetError::ConnectionClosed,
            _ => NetError::Io(err.to_string()),
        }
    }
}

impl From<&hyper::Error> for NetError {
    fn from(err: &hyper::Error) -> Self {
        if err.is_parse_status() {
            NetError::MalformedStatusLine { bytes_parsed: None }
        } else if err.is_parse() {
            NetError::InvalidHttpResponse
        } else if err.is_timeout() {
            NetError::TimedOut
        } else if err.is_canceled() {
            NetError::ConnectionAborted
        } else if err.is_closed() || err.is_incomplete_message() {
            NetError::ConnectionClosed
        } else {
            NetError::ConnectionFailed
        }
    }
}

impl From<hyper::Error> for NetError {
    fn from(err: hyper::Error) -> Self {
        NetError::from(&err)
    }
}
