//! Response body streaming.
//!
//! [`ResponseStream`] is the live handle returned for `stream: true`
//! requests, and the reader the buffered modes drain internally.

use crate::base::neterror::NetError;
use crate::http::requestbody::ByteStream;
use crate::http::response::IncomingResponse;
use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use http::{HeaderMap, StatusCode, Version};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// How body bytes are surfaced to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    /// Bytes pass through untouched.
    Binary,
    /// Every chunk is valid UTF-8; invalid sequences become U+FFFD.
    Utf8,
}

/// Incremental lossy UTF-8 decoder.
///
/// Incomplete sequences at a chunk boundary are held back until the next
/// chunk, so the concatenated output equals `String::from_utf8_lossy` of the
/// concatenated input.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = input.to_vec();
        out
    }

    /// Flush whatever incomplete sequence is left at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Readable handle over an open response body.
///
/// Dropping the handle closes the underlying response.
pub struct ResponseStream {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    inner: ByteStream,
    decoder: Option<Utf8Decoder>,
    finished: bool,
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("decoding", &self.decoding())
            .field("finished", &self.finished)
            .finish()
    }
}

impl ResponseStream {
    pub fn new(response: IncomingResponse, decoding: Decoding) -> Self {
        let (status, version, headers, inner) = response.into_parts();
        Self {
            status,
            version,
            headers,
            inner,
            decoder: match decoding {
                Decoding::Binary => None,
                Decoding::Utf8 => Some(Utf8Decoder::default()),
            },
            finished: false,
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

    pub fn decoding(&self) -> Decoding {
        if self.decoder.is_some() {
            Decoding::Utf8
        } else {
            Decoding::Binary
        }
    }

    /// Read the rest of the body into one buffer.
    pub async fn bytes(mut self) -> Result<Bytes, NetError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read the rest of the body as UTF-8 text.
    pub async fn text(self) -> Result<String, NetError> {
        let lossy = self.decoder.is_none();
        let bytes = self.bytes().await?;
        if lossy {
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }
        String::from_utf8(bytes.to_vec()).map_err(|_| NetError::InvalidUtf8)
    }
}

impl Stream for ResponseStream {
    type Item = Result<Bytes, NetError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Some(Ok(chunk))) => match this.decoder.as_mut() {
                    None => return Poll::Ready(Some(Ok(chunk))),
                    Some(decoder) => {
                        let text = decoder.decode(&chunk);
                        if !text.is_empty() {
                            return Poll::Ready(Some(Ok(Bytes::from(text))));
                        }
                    }
                },
                Poll::Ready(None) => {
                    this.finished = true;
                    let tail = this
                        .decoder
                        .as_mut()
                        .map(Utf8Decoder::finish)
                        .unwrap_or_default();
                    if tail.is_empty() {
                        return Poll::Ready(None);
                    }
                    return Poll::Ready(Some(Ok(Bytes::from(tail))));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn incoming(chunks: Vec<&'static [u8]>) -> IncomingResponse {
        let body: ByteStream = Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        ));
        IncomingResponse::new(StatusCode::OK, HeaderMap::new(), body)
    }

    #[test]
    fn test_decoder_split_multibyte() {
        let text = "añb€c";
        let raw = text.as_bytes();
        let mut decoder = Utf8Decoder::default();
        let mut out = String::new();
        for byte in raw {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        out.push_str(&decoder.finish());
        assert_eq!(out, text);
    }

    #[test]
    fn test_decoder_matches_lossy() {
        let raw: &[u8] = b"ok\xff\xfemid\xe2\x82";
        let mut decoder = Utf8Decoder::default();
        let mut out = decoder.decode(&raw[..3]);
        out.push_str(&decoder.decode(&raw[3..]));
        out.push_str(&decoder.finish());
        assert_eq!(out, String::from_utf8_lossy(raw));
    }

    #[tokio::test]
    async fn test_binary_passthrough() {
        let body = ResponseStream::new(incoming(vec![b"\x00\x01", b"\xff"]), Decoding::Binary);
        assert_eq!(body.decoding(), Decoding::Binary);
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"\x00\x01\xff"));
    }

    #[tokio::test]
    async fn test_utf8_chunks_are_valid_text() {
        // "€" split across three chunks.
        let body = ResponseStream::new(
            incoming(vec![b"price: \xe2", b"\x82", b"\xac5"]),
            Decoding::Utf8,
        );
        let chunks: Vec<Bytes> = body.map(|c| c.unwrap()).collect().await;
        for chunk in &chunks {
            assert!(std::str::from_utf8(chunk).is_ok());
        }
        assert_eq!(chunks.concat(), "price: €5".as_bytes());
    }

    #[tokio::test]
    async fn test_text_reads_everything() {
        let body = ResponseStream::new(incoming(vec![b"hel", b"lo"]), Decoding::Utf8);
        assert_eq!(body.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(NetError::ConnectionReset),
            Ok(Bytes::from_static(b"never")),
        ]));
        let mut stream = ResponseStream::new(
            IncomingResponse::new(StatusCode::OK, HeaderMap::new(), body),
            Decoding::Binary,
        );
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        assert_eq!(stream.next().await.unwrap(), Err(NetError::ConnectionReset));
        assert!(stream.next().await.is_none());
    }
}
