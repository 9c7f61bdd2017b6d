//! Future-based request client over a callback-driven [`Transport`].
//!
//! Each call normalizes its target, encodes its body, hands both to the
//! transport and resolves exactly once with the consumed response or the
//! first error.
//!
//! # Example
//!
//! ```rust,ignore
//! use netadapt::{adapt, Body, HyperTransport, ResponseConfig};
//!
//! let client = adapt(HyperTransport::new());
//! let page = client.get("http://example.com/").await?;
//! println!("{}", page.as_text().unwrap_or_default());
//!
//! let upload = client
//!     .request(
//!         "http://example.com/upload",
//!         Body::reader(tokio::fs::File::open("data.bin").await?),
//!         ResponseConfig::default().binary(true),
//!     )
//!     .await?;
//! ```

use crate::base::neterror::NetError;
use crate::http::config::{MalformedStatusPolicy, ResponseConfig};
use crate::http::consumer::consume;
use crate::http::options::{normalize, Target};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::{encode, Body, ByteStream, EncodedBody, Strategy};
use crate::http::response::{IncomingResponse, Response};
use crate::transport::{ErrorHandler, HyperTransport, RequestHandle, ResponseHandler, Transport};
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::oneshot;

/// Wrap a transport in a [`Client`] with default settings.
pub fn adapt<T: Transport>(transport: T) -> Client<T> {
    Client::new(transport)
}

/// Request client over a transport.
///
/// Cloning is cheap and clones share the transport.
pub struct Client<T: Transport> {
    transport: Arc<T>,
    default_headers: OrderedHeaderMap,
    config: ResponseConfig,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            default_headers: self.default_headers.clone(),
            config: self.config.clone(),
        }
    }
}

impl Default for Client<HyperTransport> {
    fn default() -> Self {
        Self::new(HyperTransport::new())
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: T) -> ClientBuilder<T> {
        ClientBuilder {
            transport,
            default_headers: OrderedHeaderMap::new(),
            config: ResponseConfig::default(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The config used by [`send`](Self::send) and [`get`](Self::get).
    pub fn config(&self) -> &ResponseConfig {
        &self.config
    }

    /// GET `target` with no body.
    pub async fn get(&self, target: impl Into<Target>) -> Result<Response, NetError> {
        self.request(target, Body::Empty, self.config.clone()).await
    }

    /// Send `body` to `target` using the client's default config.
    pub async fn send(
        &self,
        target: impl Into<Target>,
        body: impl Into<Body>,
    ) -> Result<Response, NetError> {
        self.request(target, body, self.config.clone()).await
    }

    /// Issue a request and consume its response per `config`.
    ///
    /// The method comes from the target; string targets always use GET.
    /// With `config.stream(true)` the returned [`Response::Stream`] owns the
    /// open body; on every other path all handles are released before
    /// returning.
    pub async fn request(
        &self,
        target: impl Into<Target>,
        body: impl Into<Body>,
        config: ResponseConfig,
    ) -> Result<Response, NetError> {
        let (settlement, outcome) = Settlement::new();
        let in_flight = match self.dispatch(target.into(), body.into(), &config, &settlement) {
            Ok(in_flight) => in_flight,
            Err(e) => {
                settlement.settle(Event::Error(e));
                InFlight::Idle
            }
        };
        drop(settlement);

        match outcome.await.unwrap_or(Event::Error(NetError::EmptyResponse)) {
            Event::Error(e) => {
                tracing::debug!(error = %e, code = e.as_i32(), "request failed");
                in_flight.abort();
                Err(e)
            }
            Event::Response(response) => {
                let consumed = consume(response, &config).await;
                if consumed.is_err() {
                    in_flight.abort();
                }
                consumed
            }
        }
    }

    fn dispatch(
        &self,
        target: Target,
        body: Body,
        config: &ResponseConfig,
        settlement: &Settlement,
    ) -> Result<InFlight<T::Handle>, NetError> {
        let mut options = normalize(target)?;
        let mut headers = self.default_headers.clone();
        headers.merge(std::mem::take(&mut options.headers));
        options.headers = headers;

        let encoded = encode(body, &mut options.headers)?;
        let strategy = encoded.strategy();
        let runtime = match strategy {
            Strategy::PipeStream | Strategy::PipeMultipart => {
                Some(tokio::runtime::Handle::try_current().map_err(|_| NetError::NoRuntime)?)
            }
            Strategy::None | Strategy::WriteOnce => None,
        };
        options.streamed_body = runtime.is_some();

        tracing::debug!(
            method = %options.method,
            url = %options.url(),
            strategy = ?strategy,
            "dispatching request"
        );

        let mut handle = self
            .transport
            .request(&options, settlement.response_handler())?;
        handle.on_error(settlement.error_handler(config.malformed_status_policy()));

        let source = match encoded {
            EncodedBody::None => {
                handle.end();
                return Ok(InFlight::Owned(handle));
            }
            EncodedBody::WriteOnce(bytes) => {
                if let Err(e) = handle.write(bytes) {
                    handle.abort();
                    return Err(e);
                }
                handle.end();
                return Ok(InFlight::Owned(handle));
            }
            EncodedBody::PipeStream(stream) => stream,
            EncodedBody::PipeMultipart(form) => form.into_inner(),
        };

        let Some(runtime) = runtime else {
            handle.abort();
            return Err(NetError::NoRuntime);
        };
        let (cancel, cancelled) = oneshot::channel();
        runtime.spawn(pipe(handle, source, cancelled, settlement.clone()));
        Ok(InFlight::Piping(cancel))
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder<T: Transport> {
    transport: T,
    default_headers: OrderedHeaderMap,
    config: ResponseConfig,
}

impl<T: Transport> ClientBuilder<T> {
    /// Header sent with every request unless the request sets its own.
    /// Invalid headers are ignored.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        if self.default_headers.insert(name, value).is_err() {
            tracing::debug!(header = name, "dropping invalid default header");
        }
        self
    }

    /// Config used by [`Client::send`] and [`Client::get`].
    pub fn response_config(mut self, config: ResponseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Client<T> {
        Client {
            transport: Arc::new(self.transport),
            default_headers: self.default_headers,
            config: self.config,
        }
    }
}

enum Event {
    Response(IncomingResponse),
    Error(NetError),
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::Response(_) => "response",
            Event::Error(_) => "error",
        }
    }
}

type Slot = Mutex<Option<oneshot::Sender<Event>>>;

/// Single-assignment outcome of one request.
///
/// The first event wins; later ones are dropped, which closes any response
/// they carry. Once every strong reference is gone without an event, the
/// receiver observes a closed channel.
#[derive(Clone)]
struct Settlement {
    slot: Arc<Slot>,
}

impl Settlement {
    fn new() -> (Self, oneshot::Receiver<Event>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    fn settle(&self, event: Event) {
        settle_slot(&self.slot, event);
    }

    fn response_handler(&self) -> ResponseHandler {
        let settlement = self.clone();
        Box::new(move |response| settlement.settle(Event::Response(response)))
    }

    /// Weak, so a transport that drops its response handler without ever
    /// reporting still lets the request resolve.
    fn error_handler(&self, policy: MalformedStatusPolicy) -> ErrorHandler {
        let slot: Weak<Slot> = Arc::downgrade(&self.slot);
        Box::new(move |err| {
            if policy == MalformedStatusPolicy::Tolerate && err.is_benign_parse_error() {
                tracing::debug!(error = %err, "ignoring malformed status line");
                return;
            }
            match slot.upgrade() {
                Some(slot) => settle_slot(&slot, Event::Error(err)),
                None => tracing::trace!(error = %err, "transport error after request finished"),
            }
        })
    }
}

fn settle_slot(slot: &Slot, event: Event) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(tx) => {
            if tx.send(event).is_err() {
                tracing::trace!("request future dropped before settlement");
            }
        }
        None => tracing::trace!(event = event.kind(), "ignoring event after settlement"),
    }
}

/// Request-side resources a call still owns while it waits.
enum InFlight<H> {
    Idle,
    Owned(H),
    /// A spawned task owns the handle; sending cancels it.
    Piping(oneshot::Sender<()>),
}

impl<H: RequestHandle> InFlight<H> {
    fn abort(self) {
        match self {
            InFlight::Idle => {}
            InFlight::Owned(mut handle) => handle.abort(),
            InFlight::Piping(cancel) => {
                let _ = cancel.send(());
            }
        }
    }
}

enum PipeFailure {
    Source(NetError),
    Write(NetError),
}

async fn drain<H: RequestHandle>(handle: &mut H, source: &mut ByteStream) -> Result<(), PipeFailure> {
    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(PipeFailure::Source)?;
        handle.write(chunk).map_err(PipeFailure::Write)?;
    }
    Ok(())
}

/// Feed `source` into `handle`, then end it exactly once.
async fn pipe<H: RequestHandle>(
    mut handle: H,
    mut source: ByteStream,
    mut cancelled: oneshot::Receiver<()>,
    settlement: Settlement,
) {
    let drained = tokio::select! {
        Ok(()) = &mut cancelled => {
            handle.abort();
            return;
        }
        result = drain(&mut handle, &mut source) => result,
    };

    match drained {
        Ok(()) => handle.end(),
        Err(PipeFailure::Source(e)) => {
            tracing::debug!(error = %e, "request body source failed, ending request");
            handle.end();
        }
        Err(PipeFailure::Write(e)) => {
            tracing::debug!(error = %e, "request body write failed");
            handle.abort();
            settlement.settle(Event::Error(e));
        }
    }
}
