//! # netadapt
//!
//! A future-based HTTP request adapter for Rust.
//!
//! `netadapt` wraps a callback-driven request primitive (options in, writable
//! handle out, response delivered to a callback) into an `async fn` that
//! encodes the request body, feeds it to the transport, and consumes the
//! response into a single settled result.
//!
//! ## Features
//!
//! - **Body Encoding**: text, URL-encoded or JSON fields, raw bytes, byte
//!   streams and multipart forms with streamed file parts
//! - **Multipart Streaming**: boundary generation and lazy part assembly
//! - **Response Consumption**: buffered text or binary, or a live body stream
//! - **Status Validation**: pluggable validators; redirects are reported
//!   with their `location`
//! - **Pluggable Transport**: any [`transport::Transport`], with an
//!   HTTP/1.1 transport on `hyper` included
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use netadapt::{adapt, Body, HyperTransport, ResponseConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = adapt(HyperTransport::new());
//!     let response = client
//!         .request(
//!             "http://localhost:8080/items",
//!             Body::fields([("name", "widget"), ("count", "3")]),
//!             ResponseConfig::default(),
//!         )
//!         .await
//!         .unwrap();
//!     println!("Status: {}", response.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`http`] - Options, body encoding, multipart forms and response handling
//! - [`transport`] - The transport seam and the `hyper` transport
//! - [`client`] - The request adapter

pub mod base;
pub mod client;
pub mod http;
pub mod transport;

pub use base::neterror::NetError;
pub use client::{adapt, Client, ClientBuilder};
pub use crate::http::{
    Body, Buffered, FileValue, Form, MalformedStatusPolicy, Part, RequestOptions, Response,
    ResponseConfig, ResponseStream, Target,
};
pub use transport::{HyperTransport, RequestHandle, Transport};
