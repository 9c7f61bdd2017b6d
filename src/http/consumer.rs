//! Turns a delivered response into the value a request resolves with.

use crate::base::neterror::NetError;
use crate::http::config::ResponseConfig;
use crate::http::response::{Buffered, IncomingResponse, Response};
use crate::http::responsebody::{Decoding, ResponseStream};
use bytes::BytesMut;
use futures::StreamExt;

/// Validate, then stream or buffer the response per `config`.
///
/// The response body is closed on every path except `stream: true`, where
/// the open handle is returned to the caller.
pub async fn consume(response: IncomingResponse, config: &ResponseConfig) -> Result<Response, NetError> {
    if let Err(e) = config.check_status(response.status(), response.headers()) {
        tracing::debug!(status = %response.status(), error = %e, "response rejected by status validator");
        response.close();
        return Err(e);
    }

    let decoding = if config.is_binary() {
        Decoding::Binary
    } else {
        Decoding::Utf8
    };
    let mut body = ResponseStream::new(response, decoding);

    if config.is_stream() {
        return Ok(Response::Stream(body));
    }

    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    let status = body.status();
    let headers = body.headers().clone();
    drop(body);

    let bytes = buf.freeze();
    tracing::trace!(status = %status, len = bytes.len(), "response buffered");
    match decoding {
        Decoding::Binary => Ok(Response::Binary(Buffered::new(status, headers, bytes))),
        Decoding::Utf8 => {
            let text = String::from_utf8(bytes.into()).map_err(|_| NetError::InvalidUtf8)?;
            Ok(Response::Text(Buffered::new(status, headers, text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::requestbody::ByteStream;
    use bytes::Bytes;
    use futures::stream;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Body stream that records when it is dropped.
    fn tracked_body(chunks: Vec<&'static [u8]>, dropped: Arc<AtomicBool>) -> ByteStream {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let flag = Flag(dropped);
        Box::pin(
            stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))).collect::<Vec<_>>())
                .map(move |chunk| {
                    let _keep = &flag;
                    chunk
                }),
        )
    }

    fn response(status: u16, chunks: Vec<&'static [u8]>, dropped: Arc<AtomicBool>) -> IncomingResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("yes"));
        IncomingResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            tracked_body(chunks, dropped),
        )
    }

    #[tokio::test]
    async fn test_buffered_text_concatenates_chunks() {
        let dropped = Arc::new(AtomicBool::new(false));
        let resp = response(200, vec![b"hello ", b"w\xc3", b"\xb6rld"], dropped.clone());
        let result = consume(resp, &ResponseConfig::default()).await.unwrap();
        assert!(dropped.load(Ordering::SeqCst));

        let text = result.into_text().unwrap();
        assert_eq!(&*text, "hello wörld");
        assert_eq!(text.headers().get("x-test").unwrap(), "yes");
        assert_eq!(text.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_buffered_binary() {
        let dropped = Arc::new(AtomicBool::new(false));
        let resp = response(200, vec![b"\xff\x00", b"\x01"], dropped);
        let config = ResponseConfig::default().binary(true);
        let result = consume(resp, &config).await.unwrap();
        let bin = result.into_binary().unwrap();
        assert_eq!(&bin[..], b"\xff\x00\x01");
        assert_eq!(bin.headers().get("x-test").unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_validation_failure_closes_body() {
        let dropped = Arc::new(AtomicBool::new(false));
        let resp = response(404, vec![b"missing"], dropped.clone());
        let err = consume(resp, &ResponseConfig::default()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stream_leaves_body_open() {
        let dropped = Arc::new(AtomicBool::new(false));
        let resp = response(200, vec![b"a", b"b"], dropped.clone());
        let config = ResponseConfig::default().stream(true).binary(true);
        let result = consume(resp, &config).await.unwrap();
        assert!(!dropped.load(Ordering::SeqCst));

        let body = result.into_stream().unwrap();
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"ab"));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_body_error_rejects() {
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(NetError::ConnectionReset),
        ]));
        let resp = IncomingResponse::new(StatusCode::OK, HeaderMap::new(), body);
        let err = consume(resp, &ResponseConfig::default()).await.unwrap_err();
        assert_eq!(err, NetError::ConnectionReset);
    }

    #[tokio::test]
    async fn test_validation_disabled_accepts_anything() {
        let dropped = Arc::new(AtomicBool::new(false));
        let resp = response(500, vec![b"oops"], dropped);
        let config = ResponseConfig::default().without_status_validation();
        let result = consume(resp, &config).await.unwrap();
        assert_eq!(result.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(result.as_text(), Some("oops"));
    }
}
