//! Request bodies and their encoding.
//!
//! [`encode`] classifies a [`Body`], rewrites `content-type` and
//! `content-length` on the outgoing headers, and picks how the bytes reach
//! the transport ([`Strategy`]).

use crate::base::neterror::NetError;
use crate::http::multipart::{Form, MultipartStream, Part};
use crate::http::orderedheaders::OrderedHeaderMap;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, TryStreamExt};
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::{Map, Value};
use std::fmt;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A boxed, sendable stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send + 'static>>;

const READ_CHUNK: usize = 8 * 1024;
const OCTET_STREAM: &str = "application/octet-stream";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Adapt an async reader into a [`ByteStream`].
pub fn stream_from_reader<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::pin(stream::try_unfold(reader, |mut reader| async move {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let n = reader.read_buf(&mut buf).await?;
        let chunk = if n == 0 {
            None
        } else {
            Some((buf.freeze(), reader))
        };
        Ok::<_, NetError>(chunk)
    }))
}

/// Request body for HTTP methods that send data.
#[derive(Default)]
pub enum Body {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Raw text, sent as-is.
    Text(String),
    /// Key/value form data, sent URL-encoded or as JSON.
    Fields(Map<String, Value>),
    /// Body with raw bytes.
    Bytes(Bytes),
    /// Body produced incrementally.
    Stream(ByteStream),
    /// multipart/form-data parts.
    Multipart(Vec<Part>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Body::Fields(m) => f.debug_tuple("Fields").field(m).finish(),
            Body::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
            Body::Multipart(parts) => f.debug_tuple("Multipart").field(parts).finish(),
        }
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(v))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<Map<String, Value>> for Body {
    fn from(m: Map<String, Value>) -> Self {
        Body::Fields(m)
    }
}

impl From<Vec<Part>> for Body {
    fn from(parts: Vec<Part>) -> Self {
        Body::Multipart(parts)
    }
}

impl From<ByteStream> for Body {
    fn from(s: ByteStream) -> Self {
        Body::Stream(s)
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::Empty
    }
}

impl Body {
    /// Form fields from key/value pairs.
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Body::Fields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Form fields from any value serializing to a JSON object.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self, NetError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Body::Fields(map)),
            Ok(other) => Err(NetError::BodySerialization(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(NetError::BodySerialization(e.to_string())),
        }
    }

    /// Stream body from any fallible chunk stream.
    pub fn stream<S, B, E>(source: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Body::Stream(Box::pin(
            source
                .map_ok(Into::into)
                .map_err(|e| NetError::BodySource(e.to_string())),
        ))
    }

    /// Stream body read from an async reader, e.g. a `tokio::fs::File`.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Body::Stream(stream_from_reader(reader))
    }

    /// Whether the body carries nothing to send.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

/// How an encoded body is handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    None,
    WriteOnce,
    PipeStream,
    PipeMultipart,
}

/// The transmit-ready form of a [`Body`].
pub enum EncodedBody {
    None,
    WriteOnce(Bytes),
    PipeStream(ByteStream),
    PipeMultipart(MultipartStream),
}

impl fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodedBody::WriteOnce(b) => f.debug_tuple("WriteOnce").field(&b.len()).finish(),
            other => write!(f, "{:?}", other.strategy()),
        }
    }
}

impl EncodedBody {
    pub fn strategy(&self) -> Strategy {
        match self {
            EncodedBody::None => Strategy::None,
            EncodedBody::WriteOnce(_) => Strategy::WriteOnce,
            EncodedBody::PipeStream(_) => Strategy::PipeStream,
            EncodedBody::PipeMultipart(_) => Strategy::PipeMultipart,
        }
    }
}

/// Classify `body`, update `headers`, and choose a transmission strategy.
///
/// `content-type` defaults are only applied when the caller set none;
/// `content-length` is only set when the full size is known up front.
pub fn encode(body: Body, headers: &mut OrderedHeaderMap) -> Result<EncodedBody, NetError> {
    match body {
        body if body.is_empty() => Ok(EncodedBody::None),
        Body::Multipart(parts) => Ok(encode_multipart(parts, headers)),
        Body::Stream(stream) => {
            headers.insert_if_absent(CONTENT_TYPE, octet_stream());
            Ok(EncodedBody::PipeStream(stream))
        }
        Body::Bytes(bytes) => {
            headers.insert_typed(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            headers.insert_if_absent(CONTENT_TYPE, octet_stream());
            Ok(EncodedBody::WriteOnce(bytes))
        }
        Body::Fields(fields) => {
            let text = if is_json(headers) {
                serde_json::to_string(&fields)
                    .map_err(|e| NetError::BodySerialization(e.to_string()))?
            } else {
                headers.remove(CONTENT_TYPE.as_str());
                urlencode_fields(&fields)
            };
            Ok(encode_text(text, headers))
        }
        Body::Text(text) => Ok(encode_text(text, headers)),
        Body::Empty => Ok(EncodedBody::None),
    }
}

fn encode_text(text: String, headers: &mut OrderedHeaderMap) -> EncodedBody {
    headers.insert_typed(CONTENT_LENGTH, HeaderValue::from(text.len()));
    headers.insert_if_absent(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
    EncodedBody::WriteOnce(Bytes::from(text))
}

fn encode_multipart(parts: Vec<Part>, headers: &mut OrderedHeaderMap) -> EncodedBody {
    let total = parts.len();
    let valid: Vec<Part> = parts.into_iter().filter(Part::is_valid).collect();
    if valid.len() < total {
        tracing::debug!(
            dropped = total - valid.len(),
            kept = valid.len(),
            "dropping invalid multipart parts"
        );
    }
    if valid.is_empty() {
        return EncodedBody::None;
    }

    let mut form = Form::new();
    for part in valid {
        form.append(part);
    }
    match HeaderValue::from_str(&form.content_type()) {
        Ok(value) => headers.insert_typed(CONTENT_TYPE, value),
        Err(_) => tracing::warn!(boundary = form.boundary(), "unrepresentable multipart boundary"),
    }
    EncodedBody::PipeMultipart(form.finalize())
}

fn octet_stream() -> HeaderValue {
    HeaderValue::from_static(OCTET_STREAM)
}

fn is_json(headers: &OrderedHeaderMap) -> bool {
    headers
        .get_str(CONTENT_TYPE.as_str())
        .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(mime::APPLICATION_JSON.as_ref()))
}

/// Query-string style serialization: arrays repeat their key, scalars use
/// their display form, anything else encodes as an empty value.
fn urlencode_fields(fields: &Map<String, Value>) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        match value {
            Value::Array(items) => {
                for item in items {
                    out.append_pair(key, &scalar_text(item));
                }
            }
            other => {
                out.append_pair(key, &scalar_text(other));
            }
        }
    }
    out.finish()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
