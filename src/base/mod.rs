//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): every failure a request can settle with

pub mod neterror;
