//! HTTP/1.1 over plain TCP, built on `hyper`'s connection API.
//!
//! Each request opens its own connection: connect, handshake, spawn the
//! connection driver, then send. The request body is fed through a channel so
//! the caller can write it after the exchange has started.

use crate::base::neterror::NetError;
use crate::http::options::RequestOptions;
use crate::http::response::IncomingResponse;
use crate::transport::{ErrorHandler, RequestHandle, ResponseHandler, Transport};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::channel::mpsc;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderValue, Request, Response};
use http_body::Frame;
use http_body_util::StreamBody;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

type OutgoingBody = StreamBody<mpsc::UnboundedReceiver<Result<Frame<Bytes>, Infallible>>>;

/// Default transport: one HTTP/1.1 connection per request.
#[derive(Debug, Clone, Default)]
pub struct HyperTransport {
    connect_timeout: Option<Duration>,
}

/// Builder for [`HyperTransport`].
#[derive(Debug, Default)]
pub struct HyperTransportBuilder {
    connect_timeout: Option<Duration>,
}

impl HyperTransportBuilder {
    /// Fail with `ConnectionTimedOut` if TCP connect takes longer.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> HyperTransport {
        HyperTransport {
            connect_timeout: self.connect_timeout,
        }
    }
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    fn build_request(
        options: &RequestOptions,
        body: OutgoingBody,
    ) -> Result<Request<OutgoingBody>, NetError> {
        let mut headers = options.headers.clone().to_header_map();
        if !headers.contains_key(HOST) {
            let host =
                HeaderValue::from_str(&options.authority()).map_err(|_| NetError::InvalidHeader)?;
            headers.insert(HOST, host);
        }
        if let Some(auth) = &options.auth {
            if !headers.contains_key(AUTHORIZATION) {
                let value = format!("Basic {}", STANDARD.encode(auth));
                let value = HeaderValue::from_str(&value).map_err(|_| NetError::InvalidHeader)?;
                headers.insert(AUTHORIZATION, value);
            }
        }
        // hyper frames an unsized GET/HEAD body as empty unless told otherwise.
        if options.streamed_body
            && !headers.contains_key(CONTENT_LENGTH)
            && !headers.contains_key(TRANSFER_ENCODING)
        {
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }

        let mut req = Request::builder()
            .method(options.method.clone())
            .uri(options.path.as_str())
            .body(body)
            .map_err(|e| NetError::InvalidUrl(e.to_string()))?;
        *req.headers_mut() = headers;
        Ok(req)
    }
}

impl Transport for HyperTransport {
    type Handle = HyperRequestHandle;

    fn request(
        &self,
        options: &RequestOptions,
        on_response: ResponseHandler,
    ) -> Result<HyperRequestHandle, NetError> {
        if options.scheme != "http" {
            return Err(NetError::UnknownUrlScheme(options.scheme.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| NetError::NoRuntime)?;
        let port = options
            .port_or_default()
            .ok_or_else(|| NetError::UnknownUrlScheme(options.scheme.clone()))?;

        let (sender, receiver) = mpsc::unbounded();
        let req = Self::build_request(options, StreamBody::new(receiver))?;

        let errors = Arc::new(ErrorSlot::default());
        let host = options.host.clone();
        let connect_timeout = self.connect_timeout;
        let task_errors = errors.clone();
        let task = runtime.spawn(async move {
            match exchange(&host, port, connect_timeout, req).await {
                Ok(resp) => on_response(IncomingResponse::from_hyper(resp)),
                Err(e) => {
                    tracing::debug!(host = %host, port, error = %e, "exchange failed");
                    task_errors.report(e);
                }
            }
        });

        Ok(HyperRequestHandle {
            sender: Some(sender),
            task,
            errors,
            ended: false,
        })
    }
}

async fn exchange(
    host: &str,
    port: u16,
    connect_timeout: Option<Duration>,
    req: Request<OutgoingBody>,
) -> Result<Response<Incoming>, NetError> {
    let dial = connect(host, port);
    let socket = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, dial)
            .await
            .map_err(|_| NetError::ConnectionTimedOut)??,
        None => dial.await?,
    };
    socket.set_nodelay(true)?;

    let (mut sender, conn) = http1::handshake(TokioIo::new(socket)).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "connection driver stopped");
        }
    });

    Ok(sender.send_request(req).await?)
}

async fn connect(host: &str, port: u16) -> Result<TcpStream, NetError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            tracing::debug!(host = %host, error = %e, "name resolution failed");
            NetError::NameNotResolved
        })?
        .collect();
    if addrs.is_empty() {
        return Err(NetError::NameNotResolved);
    }
    Ok(TcpStream::connect(&addrs[..]).await?)
}

/// Errors waiting for, or routed to, the registered handler.
#[derive(Default)]
struct ErrorSlot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    handler: Option<Arc<dyn Fn(NetError) + Send + Sync>>,
    pending: Vec<NetError>,
}

impl ErrorSlot {
    fn report(&self, err: NetError) {
        let handler = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match &state.handler {
                Some(handler) => handler.clone(),
                None => {
                    state.pending.push(err);
                    return;
                }
            }
        };
        handler(err);
    }

    fn register(&self, handler: ErrorHandler) {
        let handler: Arc<dyn Fn(NetError) + Send + Sync> = Arc::from(handler);
        let pending = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.handler = Some(handler.clone());
            std::mem::take(&mut state.pending)
        };
        for err in pending {
            handler(err);
        }
    }
}

/// Writable side of a [`HyperTransport`] request.
///
/// Dropping the handle before [`end`](RequestHandle::end) aborts the exchange.
pub struct HyperRequestHandle {
    sender: Option<mpsc::UnboundedSender<Result<Frame<Bytes>, Infallible>>>,
    task: JoinHandle<()>,
    errors: Arc<ErrorSlot>,
    ended: bool,
}

impl RequestHandle for HyperRequestHandle {
    fn on_error(&mut self, handler: ErrorHandler) {
        self.errors.register(handler);
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), NetError> {
        let sender = self.sender.as_ref().ok_or(NetError::RequestEnded)?;
        sender
            .unbounded_send(Ok(Frame::data(chunk)))
            .map_err(|_| NetError::ConnectionClosed)
    }

    fn end(&mut self) {
        self.ended = true;
        self.sender = None;
    }

    fn abort(&mut self) {
        self.ended = true;
        self.sender = None;
        self.task.abort();
    }
}

impl Drop for HyperRequestHandle {
    fn drop(&mut self) {
        if !self.ended {
            self.task.abort();
        }
    }
}
