//! The callback-driven request primitive the client adapts.
//!
//! A [`Transport`] takes request options plus a one-shot response callback
//! and hands back a writable [`RequestHandle`]. The response callback fires
//! at most once, with the response head and an open body. Failures are
//! reported through the error handler registered on the handle.
//!
//! Contract for implementors:
//!
//! - errors raised before [`RequestHandle::on_error`] is called are held and
//!   delivered on registration;
//! - the error handler may be invoked more than once, and after the response
//!   handler has fired;
//! - dropping the response handler without calling it means no response will
//!   ever arrive.

pub mod hyperclient;

use crate::base::neterror::NetError;
use crate::http::options::RequestOptions;
use crate::http::response::IncomingResponse;
use bytes::Bytes;

pub use hyperclient::{HyperRequestHandle, HyperTransport, HyperTransportBuilder};

/// Receives the response head and open body. Called at most once.
pub type ResponseHandler = Box<dyn FnOnce(IncomingResponse) + Send + 'static>;

/// Receives transport-level errors.
pub type ErrorHandler = Box<dyn Fn(NetError) + Send + Sync + 'static>;

/// Writable side of an in-flight request.
pub trait RequestHandle: Send + 'static {
    /// Register the error listener. Called once, before any write.
    fn on_error(&mut self, handler: ErrorHandler);

    /// Queue a body chunk.
    fn write(&mut self, chunk: Bytes) -> Result<(), NetError>;

    /// Finish the request body.
    fn end(&mut self);

    /// Abandon the exchange; no further events are delivered.
    fn abort(&mut self);
}

/// The request primitive.
pub trait Transport: Send + Sync + 'static {
    type Handle: RequestHandle;

    /// Start a request. Returning `Err` means nothing was sent and neither
    /// handler will be called.
    fn request(
        &self,
        options: &RequestOptions,
        on_response: ResponseHandler,
    ) -> Result<Self::Handle, NetError>;
}

impl<F, H> Transport for F
where
    F: Fn(&RequestOptions, ResponseHandler) -> Result<H, NetError> + Send + Sync + 'static,
    H: RequestHandle,
{
    type Handle = H;

    fn request(
        &self,
        options: &RequestOptions,
        on_response: ResponseHandler,
    ) -> Result<H, NetError> {
        self(options, on_response)
    }
}
