//! Scripted in-memory transport shared by the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use netadapt::base::neterror::NetError;
use netadapt::http::{ByteStream, IncomingResponse, RequestOptions};
use netadapt::transport::{ErrorHandler, RequestHandle, ResponseHandler, Transport};
use std::sync::{Arc, Mutex};

/// Builds a fresh response for each exchange.
pub type Responder = Arc<dyn Fn() -> IncomingResponse + Send + Sync>;

/// What the transport does once the request body is ended, unless noted.
#[derive(Clone)]
pub enum Script {
    /// Deliver a response.
    Respond(Responder),
    /// Report a transport error.
    Fail(NetError),
    /// Refuse the request up front.
    Refuse(NetError),
    /// Report a malformed status line with parsed bytes, then respond.
    BenignThenRespond(Responder),
    /// Respond, then report a late error.
    RespondThenFail(Responder, NetError),
    /// Respond as soon as handlers are in place, before any body arrives.
    RespondEarly(Responder),
    /// Drop the response handler without ever calling it.
    Hang,
}

/// Everything the transport observed for one request.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub options: RequestOptions,
    pub body: Vec<u8>,
    pub writes: usize,
    pub ended: bool,
    pub aborted: bool,
}

impl Exchange {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.options.headers.get_str(name)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct ScriptedTransport {
    script: Script,
    exchanges: Arc<Mutex<Vec<Exchange>>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            exchanges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.lock().unwrap().clone()
    }

    pub fn last(&self) -> Exchange {
        self.exchanges().pop().expect("no request reached the transport")
    }
}

impl Transport for ScriptedTransport {
    type Handle = ScriptedHandle;

    fn request(
        &self,
        options: &RequestOptions,
        on_response: ResponseHandler,
    ) -> Result<ScriptedHandle, NetError> {
        if let Script::Refuse(e) = &self.script {
            return Err(e.clone());
        }
        let index = {
            let mut exchanges = self.exchanges.lock().unwrap();
            exchanges.push(Exchange {
                options: options.clone(),
                ..Exchange::default()
            });
            exchanges.len() - 1
        };
        Ok(ScriptedHandle {
            exchanges: self.exchanges.clone(),
            index,
            script: self.script.clone(),
            on_response: Some(on_response),
            on_error: None,
        })
    }
}

pub struct ScriptedHandle {
    exchanges: Arc<Mutex<Vec<Exchange>>>,
    index: usize,
    script: Script,
    on_response: Option<ResponseHandler>,
    on_error: Option<ErrorHandler>,
}

impl ScriptedHandle {
    fn record(&self, f: impl FnOnce(&mut Exchange)) {
        f(&mut self.exchanges.lock().unwrap()[self.index]);
    }

    fn respond(&mut self, responder: &Responder) {
        if let Some(handler) = self.on_response.take() {
            handler(responder());
        }
    }

    fn fail(&self, err: NetError) {
        if let Some(handler) = &self.on_error {
            handler(err);
        }
    }
}

impl RequestHandle for ScriptedHandle {
    fn on_error(&mut self, handler: ErrorHandler) {
        self.on_error = Some(handler);
        if let Script::RespondEarly(responder) = self.script.clone() {
            self.respond(&responder);
        }
    }

    fn write(&mut self, chunk: Bytes) -> Result<(), NetError> {
        self.record(|ex| {
            ex.body.extend_from_slice(&chunk);
            ex.writes += 1;
        });
        Ok(())
    }

    fn end(&mut self) {
        self.record(|ex| ex.ended = true);
        match self.script.clone() {
            Script::Respond(responder) => self.respond(&responder),
            Script::Fail(e) => self.fail(e),
            Script::BenignThenRespond(responder) => {
                self.fail(NetError::MalformedStatusLine {
                    bytes_parsed: Some(7),
                });
                self.respond(&responder);
            }
            Script::RespondThenFail(responder, e) => {
                self.respond(&responder);
                self.fail(e);
            }
            Script::Hang => self.on_response = None,
            Script::Refuse(_) | Script::RespondEarly(_) => {}
        }
    }

    fn abort(&mut self) {
        self.record(|ex| ex.aborted = true);
        self.on_response = None;
    }
}

/// A responder serving the same status, headers and body chunks each time.
pub fn responder(status: u16, headers: &[(&str, &str)], chunks: &[&[u8]]) -> Responder {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    let chunks: Vec<Bytes> = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
    Arc::new(move || {
        let body: ByteStream = Box::pin(stream::iter(
            chunks.clone().into_iter().map(Ok).collect::<Vec<_>>(),
        ));
        IncomingResponse::new(StatusCode::from_u16(status).unwrap(), map.clone(), body)
    })
}

pub fn respond(status: u16, headers: &[(&str, &str)], chunks: &[&[u8]]) -> Script {
    Script::Respond(responder(status, headers, chunks))
}

pub fn ok_text(body: &'static str) -> Script {
    respond(200, &[("content-type", "text/plain")], &[body.as_bytes()])
}
