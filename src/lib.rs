//! HTTP/1.1 client session with connection reuse.
//!
//! A [`ClientSession`] sends requests to one target host over a [`Transport`], keeps
//! the connection alive between exchanges, and transparently replaces a kept-alive
//! connection the server has closed while it was idle. Requests can go directly to
//! the target or through a forward proxy.
//!
//! The session does not own a socket implementation, it is given one. With the
//! default `tcp` feature, [`TcpTransport`](transport::TcpTransport) provides plain TCP.
//!
//! # Exchanges
//!
//! Every request-response goes through the same steps:
//!
//! 1. [`ClientSession::begin_request()`] normalizes the request headers, connects or
//!    reuses the connection, and sends the header block. It returns a
//!    [`RequestBody`] to write the body (if any).
//! 2. [`ClientSession::end_response()`] finishes the body, reads the response header
//!    and returns a [`ResponseBody`] to read the body.
//!
//! The body handles borrow the session, so the order is enforced at compile time for
//! the common case. Calls out of order, such as two `begin_request()` without an
//! `end_response()` in between, are reported as lifecycle errors.
//!
//! # Example
//!
//! ```no_run
//! use std::io::Read;
//!
//! use h1_session::http::{Request, Response};
//! use h1_session::transport::{TcpConfig, TcpTransport};
//! use h1_session::ClientSession;
//!
//! let transport = TcpTransport::new(TcpConfig::default());
//! let mut session = ClientSession::new(transport, "example.test", 8080);
//!
//! for path in ["/a", "/b"] {
//!     let mut request = Request::get(path).body(()).unwrap();
//!     session.begin_request(&mut request).unwrap();
//!
//!     let mut response = Response::default();
//!     let mut body = session.end_response(&mut response).unwrap();
//!
//!     let mut data = Vec::new();
//!     body.read_to_end(&mut data).unwrap();
//!     println!("{} {} bytes", response.status(), data.len());
//! }
//! ```
//!
//! # Proxy
//!
//! With [`ClientSession::set_proxy()`], the session connects to the proxy and sends
//! requests with the absolute-form request target `http://host:port/path`. The
//! `host` header stays the target. `CONNECT` requests use the authority-form
//! `host:port`.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod body;
mod close_reason;
mod error;
mod ext;
mod parser;
mod session;
mod util;

pub mod transport;

pub use http;

pub use body::BodyMode;
pub use close_reason::CloseReason;
pub use error::{Error, ErrorCategory};
pub use parser::ReasonPhrase;
pub use session::{ClientSession, ConnectionState, RequestBody, ResponseBody};
pub use session::{DEFAULT_PORT, MAX_RESPONSE_HEADERS, MAX_RESPONSE_HEAD_SIZE};
pub use transport::{Address, Transport};
