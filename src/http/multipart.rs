//! Multipart form data support.
//!
//! Provides RFC 7578 multipart/form-data encoding where file parts are
//! streamed rather than buffered.
//!
//! # Example
//! ```ignore
//! use netadapt::http::multipart::{FileValue, Form, Part};
//!
//! let mut form = Form::new();
//! form.append(Part::new("username", "user123"));
//! form.append(Part::file("upload", FileValue::new().filename("doc.txt")));
//!
//! let content_type = form.content_type();
//! let body = form.finalize();
//! ```

use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::{stream_from_reader, ByteStream};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;

const BOUNDARY_PREFIX: &str = "----netadapt-boundary-";

/// Characters kept literal in a URI component: unreserved plus `!*'()`.
const COMPONENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A plain form value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i128),
    Number(f64),
    Bytes(Bytes),
}

impl Scalar {
    fn into_bytes(self) -> Bytes {
        match self {
            Scalar::Text(s) => Bytes::from(s),
            Scalar::Integer(n) => Bytes::from(n.to_string()),
            Scalar::Number(n) => Bytes::from(n.to_string()),
            Scalar::Bytes(b) => b,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<Bytes> for Scalar {
    fn from(b: Bytes) -> Self {
        Scalar::Bytes(b)
    }
}

impl From<Vec<u8>> for Scalar {
    fn from(v: Vec<u8>) -> Self {
        Scalar::Bytes(Bytes::from(v))
    }
}

macro_rules! scalar_from_number {
    ($variant:ident: $($t:ty),*) => {
        $(impl From<$t> for Scalar {
            fn from(n: $t) -> Self {
                Scalar::$variant(n.into())
            }
        })*
    };
}

scalar_from_number!(Integer: i8, i16, i32, i64, u8, u16, u32, u64);
scalar_from_number!(Number: f32, f64);

/// A file-like part value: an optional content stream plus metadata.
///
/// Only usable when it carries a stream or a file name; a name-only value
/// is sent as an empty file.
#[derive(Default)]
pub struct FileValue {
    pub file: Option<ByteStream>,
    pub filename: Option<String>,
    pub mime: Option<String>,
    pub headers: OrderedHeaderMap,
}

impl fmt::Debug for FileValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileValue")
            .field("file", &self.file.as_ref().map(|_| "<stream>"))
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .field("headers", &self.headers)
            .finish()
    }
}

impl FileValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the content stream.
    pub fn file(mut self, file: ByteStream) -> Self {
        self.file = Some(file);
        self
    }

    /// Attach content read from an async reader, e.g. a `tokio::fs::File`.
    pub fn reader<R>(self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.file(stream_from_reader(reader))
    }

    pub fn filename<S: Into<String>>(mut self, name: S) -> Self {
        self.filename = Some(name.into());
        self
    }

    pub fn mime<S: Into<String>>(mut self, mime: S) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Add a part header. Only `content-type` is consulted when encoding.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.headers.insert(name, value).is_err() {
            tracing::debug!(header = name, "dropping invalid part header");
        }
        self
    }

    pub fn is_usable(&self) -> bool {
        self.file.is_some() || self.filename.is_some()
    }

    /// Part content type: explicit mime, then nested header, then
    /// octet-stream for anonymous streams.
    fn content_type(&self) -> Option<String> {
        if let Some(mime) = &self.mime {
            return Some(mime.clone());
        }
        if let Some(ct) = self.headers.get_str("content-type") {
            return Some(ct.to_string());
        }
        if self.file.is_some() && self.filename.is_none() {
            return Some(mime::APPLICATION_OCTET_STREAM.to_string());
        }
        None
    }
}

#[derive(Debug)]
pub enum PartValue {
    Scalar(Scalar),
    File(FileValue),
}

impl From<Scalar> for PartValue {
    fn from(value: Scalar) -> Self {
        PartValue::Scalar(value)
    }
}

impl From<FileValue> for PartValue {
    fn from(value: FileValue) -> Self {
        PartValue::File(value)
    }
}

/// One named field of a multipart body.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub value: Option<PartValue>,
}

impl Part {
    pub fn new<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<Scalar>,
    {
        Self {
            name: name.into(),
            value: Some(PartValue::Scalar(value.into())),
        }
    }

    pub fn file<N: Into<String>>(name: N, value: FileValue) -> Self {
        Self {
            name: name.into(),
            value: Some(PartValue::File(value)),
        }
    }

    /// Whether the part survives body encoding.
    pub fn is_valid(&self) -> bool {
        if self.name.is_empty() {
            return false;
        }
        match &self.value {
            None => false,
            Some(PartValue::Scalar(_)) => true,
            Some(PartValue::File(file)) => file.is_usable(),
        }
    }
}

/// A multipart form under construction.
pub struct Form {
    boundary: String,
    segments: Vec<ByteStream>,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("boundary", &self.boundary)
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    /// Create a new empty form with a fresh random boundary.
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    pub fn with_boundary<S: Into<String>>(boundary: S) -> Self {
        Self {
            boundary: boundary.into(),
            segments: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, self.boundary)
    }

    /// Queue a part. Parts are emitted in the order they are appended.
    pub fn append(&mut self, part: Part) {
        let Part { name, value } = part;
        let (filename, content_type, body) = match value {
            None => (None, None, None),
            Some(PartValue::Scalar(scalar)) => (None, None, Some(once(scalar.into_bytes()))),
            Some(PartValue::File(mut file)) => {
                let content_type = file.content_type();
                (file.filename.take(), content_type, file.file.take())
            }
        };

        let mut head = BytesMut::new();
        head.extend_from_slice(b"--");
        head.extend_from_slice(self.boundary.as_bytes());
        head.extend_from_slice(b"\r\n");
        head.extend_from_slice(format_headers(&name, filename.as_deref(), content_type.as_deref()).as_bytes());
        head.extend_from_slice(b"\r\n\r\n");

        self.segments.push(once(head.freeze()));
        if let Some(body) = body {
            self.segments.push(body);
        }
        self.segments.push(once(Bytes::from_static(b"\r\n")));
    }

    /// Close the form: queue the closing boundary and hand back the body.
    pub fn finalize(mut self) -> MultipartStream {
        let mut tail = BytesMut::with_capacity(self.boundary.len() + 6);
        tail.extend_from_slice(b"--");
        tail.extend_from_slice(self.boundary.as_bytes());
        tail.extend_from_slice(b"--\r\n");
        self.segments.push(once(tail.freeze()));

        MultipartStream {
            inner: Box::pin(stream::iter(self.segments).flatten()),
        }
    }
}

/// The serialized body of a finalized [`Form`].
pub struct MultipartStream {
    inner: ByteStream,
}

impl MultipartStream {
    pub fn into_inner(self) -> ByteStream {
        self.inner
    }
}

impl Stream for MultipartStream {
    type Item = <ByteStream as Stream>::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

fn once(bytes: Bytes) -> ByteStream {
    Box::pin(stream::once(futures::future::ready(Ok(bytes))))
}

/// Format the part headers.
fn format_headers(name: &str, filename: Option<&str>, content_type: Option<&str>) -> String {
    let mut header = format!(
        "Content-Disposition: form-data; name=\"{}\"",
        utf8_percent_encode(name, COMPONENT_ENCODE_SET)
    );

    if let Some(filename) = filename {
        header.push_str(&format!("; filename=\"{}\"", escape_quotes(filename)));
    }

    if let Some(mime) = content_type {
        header.push_str(&format!("\r\nContent-Type: {}", mime));
    }

    header
}

/// Escape quotes and backslashes in a string.
fn escape_quotes(s: &str) -> Cow<'_, str> {
    if s.contains('"') || s.contains('\\') || s.contains('\r') || s.contains('\n') {
        Cow::Owned(
            s.replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\r', "\\r")
                .replace('\n', "\\n"),
        )
    } else {
        Cow::Borrowed(s)
    }
}

fn generate_boundary() -> String {
    format!(
        "{}{:016x}{:016x}",
        BOUNDARY_PREFIX,
        rand::random::<u64>(),
        rand::random::<u64>()
    )
}
