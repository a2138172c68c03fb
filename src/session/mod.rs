//! HTTP/1.1 client session
//!
//! A [`ClientSession`] drives one exchange at a time over a [`Transport`]. It
//! decides whether the transport must be connected, reused or reconnected, frames
//! the request for a direct or proxied connection, and hands out exclusive handles
//! for the request and response bodies.
//!
//! ```text
//!                      begin_request()
//!   ┌──────────┐    ┌──────────────────┐    ┌──────────────────┐
//!   │   Idle   │───▶│     SendBody     │───▶│     RecvBody     │
//!   └──────────┘    └──────────────────┘    └──────────────────┘
//!        ▲                        end_response()      │
//!        └────────────────────────────────────────────┘
//!                body read to end, or forced release
//!                   by the next begin_request()
//! ```
//!
//! The connection itself follows its own state machine, see [`ConnectionState`].
//!
//! ```text
//!   ┌──────────────┐  connect  ┌──────────────┐  check: stale  ┌──────────────┐
//!   │ Unconnected  │──────────▶│  Connected   │───────────────▶│    Stale     │
//!   └──────────────┘           └──────────────┘                └──────────────┘
//!          ▲                          │                                │
//!          └──────────────────────────┴────────────────────────────────┘
//!                         close, failure, must-close response
//! ```
//!
//! At most one implicit reconnect happens per exchange. A reused connection that
//! is stale, or that fails while the header block is written, is reconnected once
//! and the header block is sent again. A second failure is surfaced to the caller.

use std::io;
use std::mem;

use http::uri::Scheme;
use http::{HeaderValue, Method, Request, Response};

use crate::body::{BodyMode, BodyReader, BodyWriter};
use crate::close_reason::CloseReason;
use crate::ext::{HeaderMapExt, StatusExt};
use crate::parser::try_parse_response;
use crate::transport::{Address, Transport};
use crate::util::log_data;
use crate::Error;

use framing::{Proxy, Target};
use prepare::{basic_auth, prepare, Options};

mod framing;
mod prepare;
mod stream;

pub use stream::{RequestBody, ResponseBody};

#[cfg(test)]
mod test;

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 80;

/// Max number of headers to parse from an HTTP response
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// Max size of a response header block, including the status line.
pub const MAX_RESPONSE_HEAD_SIZE: usize = 64 * 1024;

/// Reconnects allowed within one `begin_request()`.
const MAX_IMPLICIT_RECONNECTS: usize = 1;

/// Amount to read from the transport in one go.
const READ_CHUNK: usize = 8 * 1024;

/// What the session believes about the transport connection.
///
/// This is a cache. The socket might have been closed by the peer since the
/// session last looked, which is what the staleness check finds out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. The next exchange connects from scratch.
    Unconnected,
    /// Connected and believed usable.
    Connected,
    /// Connected, but the peer has closed its end.
    Stale,
}

impl ConnectionState {
    fn on_connect(self) -> Self {
        ConnectionState::Connected
    }

    fn on_stale_check(self, stale: bool) -> Self {
        match self {
            ConnectionState::Unconnected => ConnectionState::Unconnected,
            _ if stale => ConnectionState::Stale,
            _ => ConnectionState::Connected,
        }
    }

    fn on_close(self) -> Self {
        ConnectionState::Unconnected
    }
}

/// Where the current exchange is at.
#[derive(Debug)]
enum Exchange {
    Idle,
    SendBody { method: Method, writer: BodyWriter },
    RecvBody { reader: BodyReader },
}

/// Client side of an HTTP/1.1 connection to one target.
///
/// # Example
///
/// ```no_run
/// use std::io::{Read, Write};
///
/// use h1_session::http::{Request, Response};
/// use h1_session::transport::{TcpConfig, TcpTransport};
/// use h1_session::ClientSession;
///
/// let transport = TcpTransport::new(TcpConfig::default());
/// let mut session = ClientSession::new(transport, "example.test", 8080);
///
/// let mut request = Request::post("/upload")
///     .header("content-length", 5)
///     .body(())
///     .unwrap();
///
/// let mut body = session.begin_request(&mut request).unwrap();
/// body.write_all(b"hello").unwrap();
/// drop(body);
///
/// let mut response = Response::default();
/// let mut body = session.end_response(&mut response).unwrap();
///
/// let mut text = String::new();
/// body.read_to_string(&mut text).unwrap();
///
/// // The same connection is reused for the next request.
/// let mut request = Request::get("/status").body(()).unwrap();
/// session.begin_request(&mut request).unwrap();
/// ```
pub struct ClientSession<T: Transport> {
    transport: T,
    host: String,
    port: u16,
    scheme: Scheme,
    /// Empty when no proxy is configured.
    proxy_host: String,
    proxy_port: u16,
    proxy_authorization: Option<HeaderValue>,
    keep_alive: bool,
    allow_non_standard_methods: bool,
    state: ConnectionState,
    exchange: Exchange,
    expect_response_body: bool,
    close_reason: Option<CloseReason>,
    /// Bytes read from the transport, but not yet consumed.
    input: Vec<u8>,
}

impl<T: Transport> ClientSession<T> {
    /// Create an unconnected session for `host:port`.
    ///
    /// Keep-alive is on by default.
    pub fn new(transport: T, host: impl Into<String>, port: u16) -> Self {
        ClientSession {
            transport,
            host: host.into(),
            port,
            scheme: Scheme::HTTP,
            proxy_host: String::new(),
            proxy_port: DEFAULT_PORT,
            proxy_authorization: None,
            keep_alive: true,
            allow_non_standard_methods: false,
            state: ConnectionState::Unconnected,
            exchange: Exchange::Idle,
            expect_response_body: false,
            close_reason: None,
            input: Vec::new(),
        }
    }

    // //////////////////////////////////////////////////////////////////////////////////////// CONFIG

    /// The target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Scheme used for the absolute-form request target and the default port.
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// The proxy host, if a proxy is configured.
    pub fn proxy_host(&self) -> Option<&str> {
        Some(self.proxy_host.as_str()).filter(|h| !h.is_empty())
    }

    /// The proxy port, [`DEFAULT_PORT`] unless set.
    pub fn proxy_port(&self) -> u16 {
        self.proxy_port
    }

    /// The proxy in use, which requires a proxy host.
    fn proxy(&self) -> Option<Proxy> {
        self.proxy_host().map(|host| Proxy {
            host: host.to_string(),
            port: self.proxy_port,
        })
    }

    /// Whether connections are kept open between exchanges.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Change the target host. Only allowed while unconnected.
    pub fn set_host(&mut self, host: impl Into<String>) -> Result<(), Error> {
        self.ensure_unconnected("host")?;
        self.host = host.into();
        Ok(())
    }

    /// Change the target port. Only allowed while unconnected.
    pub fn set_port(&mut self, port: u16) -> Result<(), Error> {
        self.ensure_unconnected("port")?;
        self.port = port;
        Ok(())
    }

    /// Change the scheme. Only allowed while unconnected.
    ///
    /// The session does no TLS itself, a transport wrapping TLS goes together
    /// with `Scheme::HTTPS`.
    pub fn set_scheme(&mut self, scheme: Scheme) -> Result<(), Error> {
        self.ensure_unconnected("scheme")?;
        self.scheme = scheme;
        Ok(())
    }

    /// Route requests through a forward proxy. Only allowed while unconnected.
    pub fn set_proxy(&mut self, host: impl Into<String>, port: u16) -> Result<(), Error> {
        self.ensure_unconnected("proxy")?;
        self.proxy_host = host.into();
        self.proxy_port = port;
        Ok(())
    }

    /// Change the proxy host, keeping the proxy port.
    ///
    /// An empty host means no proxy.
    pub fn set_proxy_host(&mut self, host: impl Into<String>) -> Result<(), Error> {
        self.ensure_unconnected("proxy")?;
        self.proxy_host = host.into();
        Ok(())
    }

    /// Change the proxy port. No proxy is used until a proxy host is set.
    pub fn set_proxy_port(&mut self, port: u16) -> Result<(), Error> {
        self.ensure_unconnected("proxy")?;
        self.proxy_port = port;
        Ok(())
    }

    /// Stop using a proxy. Only allowed while unconnected.
    pub fn clear_proxy(&mut self) -> Result<(), Error> {
        self.ensure_unconnected("proxy")?;
        self.proxy_host.clear();
        self.proxy_port = DEFAULT_PORT;
        Ok(())
    }

    /// Send `proxy-authorization: Basic ...` on proxied requests.
    pub fn set_proxy_credentials(&mut self, user: &str, pass: &str) -> Result<(), Error> {
        self.ensure_unconnected("proxy credentials")?;
        self.proxy_authorization = Some(basic_auth(user, pass)?);
        Ok(())
    }

    /// Turn keep-alive on or off. Only allowed while unconnected.
    pub fn set_keep_alive(&mut self, enabled: bool) -> Result<(), Error> {
        self.ensure_unconnected("keep-alive")?;
        self.keep_alive = enabled;
        Ok(())
    }

    /// Set whether to allow non-standard HTTP methods.
    ///
    /// By default the methods are limited by the HTTP version.
    pub fn allow_non_standard_methods(&mut self, v: bool) {
        self.allow_non_standard_methods = v;
    }

    fn ensure_unconnected(&self, what: &'static str) -> Result<(), Error> {
        if self.state != ConnectionState::Unconnected {
            return Err(Error::ConnectedSession(what));
        }
        Ok(())
    }

    // //////////////////////////////////////////////////////////////////////////////////////// STATE

    /// What the session believes about the connection.
    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the last response announced a body.
    ///
    /// `false` for responses to HEAD, and for 1xx, 204 and 304 responses.
    pub fn expect_response_body(&self) -> bool {
        self.expect_response_body
    }

    /// Why the connection is closed after the current exchange, if it is.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Tell whether a request is sent, but the response not yet received.
    pub fn is_request_pending(&self) -> bool {
        matches!(self.exchange, Exchange::SendBody { .. })
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // //////////////////////////////////////////////////////////////////////////////////////// EXCHANGE

    /// Send the header block of `request` and return a handle for its body.
    ///
    /// The session amends `request` in place: it adds `host` and `connection`
    /// headers unless present, adds `transfer-encoding: chunked` when a body is
    /// expected without framing headers, and rewrites the URI to the request-target
    /// that goes on the wire. With a proxy that is the absolute-form
    /// `http://host:port/path`, without a proxy the origin-form `/path`.
    ///
    /// An unread response body from the previous exchange is released first. If
    /// bytes of it remain, the connection is closed since the stream position is lost.
    ///
    /// Errors with [`Error::RequestBodyPending`] if the previous request was never
    /// followed by [`end_response()`][Self::end_response].
    pub fn begin_request<B>(
        &mut self,
        request: &mut Request<B>,
    ) -> Result<RequestBody<'_, T>, Error> {
        self.release_outstanding()?;

        let proxy = self.proxy();

        let target = Target {
            host: &self.host,
            port: self.port,
            scheme: &self.scheme,
            proxy: proxy.as_ref(),
        };

        let options = Options {
            keep_alive: self.keep_alive,
            allow_non_standard_methods: self.allow_non_standard_methods,
            proxy_authorization: self.proxy_authorization.as_ref(),
        };

        let prepared = prepare(request, &target, &options)?;

        debug!(
            "Begin {} {} ({:?} via {})",
            prepared.method,
            request.uri(),
            prepared.framing,
            prepared.address
        );

        self.expect_response_body = false;
        self.close_reason = prepared.close_reason;

        self.send_head(&prepared.address, &prepared.head)?;

        self.exchange = Exchange::SendBody {
            method: prepared.method,
            writer: prepared.writer,
        };

        Ok(RequestBody::new(self))
    }

    /// Finish the request body and receive the response header into `response`.
    ///
    /// The request body is finalized implicitly, which for chunked transfer means
    /// sending the terminating chunk. Returns a handle to read the response body.
    ///
    /// Interim 1xx responses (other than 101) are discarded.
    pub fn end_response(
        &mut self,
        response: &mut Response<()>,
    ) -> Result<ResponseBody<'_, T>, Error> {
        let (method, mut writer) = match mem::replace(&mut self.exchange, Exchange::Idle) {
            Exchange::SendBody { method, writer } => (method, writer),
            other => {
                self.exchange = other;
                return Err(Error::ResponseWithoutRequest);
            }
        };

        let mut out = Vec::new();
        if let Err(e) = writer.finish(&mut out) {
            // The peer waits for bytes we will never send.
            self.close_transport();
            return Err(e);
        }
        self.send(&out)?;

        let res = match self.read_head() {
            Ok(v) => v,
            Err(e) => {
                self.close_transport();
                return Err(e);
            }
        };

        let reader = match BodyReader::for_response(&method, res.status(), res.headers()) {
            Ok(v) => v,
            Err(e) => {
                self.close_transport();
                return Err(e);
            }
        };

        self.expect_response_body = reader.body_mode() != BodyMode::NoBody;

        if self.close_reason.is_none() {
            self.close_reason = if res.version() == http::Version::HTTP_10 {
                Some(CloseReason::Http10)
            } else if res.headers().has(http::header::CONNECTION, "close") {
                Some(CloseReason::ServerConnectionClose)
            } else if reader.is_close_delimited() {
                Some(CloseReason::CloseDelimitedBody)
            } else {
                None
            };
        }

        debug!(
            "Response {} {:?} ({:?})",
            res.status(),
            reader.body_mode(),
            self.close_reason.map(|r| r.explain())
        );

        *response = res;

        let ended = reader.is_ended();
        self.exchange = Exchange::RecvBody { reader };

        if ended {
            self.finish_exchange();
        }

        Ok(ResponseBody::new(self))
    }

    /// Close the connection, releasing any outstanding request or response body.
    ///
    /// The next [`begin_request()`][Self::begin_request] connects from scratch.
    pub fn abandon(&mut self) {
        if !matches!(self.exchange, Exchange::Idle) {
            debug!("Abandon exchange");
        }
        self.exchange = Exchange::Idle;
        self.close_transport();
    }

    fn release_outstanding(&mut self) -> Result<(), Error> {
        let unread = match &self.exchange {
            Exchange::Idle => return Ok(()),
            Exchange::SendBody { .. } => return Err(Error::RequestBodyPending),
            Exchange::RecvBody { reader } => !reader.is_ended(),
        };

        if unread {
            debug!("Force release of unread response body");
            self.abandon();
        } else {
            self.finish_exchange();
        }

        Ok(())
    }

    fn finish_exchange(&mut self) {
        self.exchange = Exchange::Idle;

        if let Some(reason) = self.close_reason {
            debug!("Close connection: {}", reason.explain());
            self.close_transport();
        }
    }

    fn close_transport(&mut self) {
        if self.state != ConnectionState::Unconnected || self.transport.is_connected() {
            self.transport.close();
        }
        self.state = self.state.on_close();
        self.input.clear();
    }

    // //////////////////////////////////////////////////////////////////////////////////////// CONNECT

    /// Get a usable connection and write the header block to it.
    fn send_head(&mut self, address: &Address, head: &[u8]) -> Result<(), Error> {
        let mut reconnects = 0;

        loop {
            let reused = match self.state {
                ConnectionState::Unconnected => {
                    self.connect(address)?;
                    false
                }
                ConnectionState::Connected | ConnectionState::Stale if !self.keep_alive => {
                    debug!("Keep-alive disabled, reconnect");
                    self.close_transport();
                    self.connect(address)?;
                    false
                }
                ConnectionState::Connected | ConnectionState::Stale => true,
            };

            if reused || reconnects > 0 {
                // Unconsumed input means the stream is out of sync.
                let stale = !self.input.is_empty()
                    || !self.transport.is_connected()
                    || self.transport.is_stale();

                self.state = self.state.on_stale_check(stale);

                if self.state == ConnectionState::Stale {
                    self.close_transport();

                    if reconnects >= MAX_IMPLICIT_RECONNECTS {
                        debug!("Connection stale after reconnect");
                        return Err(Error::StaleConnection);
                    }

                    debug!("Stale connection, reconnect");
                    reconnects += 1;
                    continue;
                }
            }

            if reused {
                debug!("Reuse connection to {}", address);
            }

            match self.write_all(head) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.close_transport();

                    if reused && reconnects < MAX_IMPLICIT_RECONNECTS {
                        debug!("Write to reused connection failed, reconnect: {}", e);
                        reconnects += 1;
                        continue;
                    }

                    return Err(e.into());
                }
            }
        }
    }

    fn connect(&mut self, address: &Address) -> Result<(), Error> {
        debug!("Connect to {}", address);

        if self.transport.is_connected() {
            self.transport.close();
        }
        self.input.clear();

        if let Err(e) = self.transport.connect(address) {
            debug!("Connect to {} failed: {}", address, e);
            self.state = self.state.on_close();
            return Err(e.into());
        }

        self.state = self.state.on_connect();
        Ok(())
    }

    // //////////////////////////////////////////////////////////////////////////////////////// IO

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.transport.write_all(data)?;
        self.transport.flush()
    }

    /// Write to the transport, any failure ends the exchange.
    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if let Err(e) = self.write_all(data) {
            self.fail();
            return Err(e.into());
        }
        Ok(())
    }

    fn fail(&mut self) {
        self.exchange = Exchange::Idle;
        self.close_transport();
    }

    /// Read more from the transport into the input buffer.
    ///
    /// `Ok(0)` means EOF.
    fn fill_input(&mut self) -> Result<usize, Error> {
        let len = self.input.len();
        self.input.resize(len + READ_CHUNK, 0);

        let result = loop {
            match self.transport.read(&mut self.input[len..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                r => break r,
            }
        };

        let n = *result.as_ref().unwrap_or(&0);
        self.input.truncate(len + n);

        Ok(result?)
    }

    fn read_head(&mut self) -> Result<Response<()>, Error> {
        loop {
            if let Some((input_used, res)) =
                try_parse_response::<MAX_RESPONSE_HEADERS>(&self.input)?
            {
                log_data(&self.input[..input_used]);
                self.input.drain(..input_used);

                if res.status().is_discarded_interim() {
                    // Unsolicited 100-continue, 102 Processing, 103 Early Hints etc.
                    debug!("Discard interim response: {}", res.status());
                    continue;
                }

                return Ok(res);
            }

            if self.input.len() >= MAX_RESPONSE_HEAD_SIZE {
                return Err(Error::ResponseHeadTooLarge);
            }

            if self.fill_input()? == 0 {
                return Err(if self.input.is_empty() {
                    Error::ConnectionClosed
                } else {
                    Error::IncompleteResponse
                });
            }
        }
    }

    fn write_body(&mut self, input: &[u8]) -> Result<usize, Error> {
        let Exchange::SendBody { writer, .. } = &mut self.exchange else {
            return Err(Error::ExchangeAborted);
        };

        let mut out = Vec::with_capacity(input.len() + 16);
        writer.write(input, &mut out)?;

        self.send(&out)?;

        Ok(input.len())
    }

    fn finish_body(&mut self) -> Result<(), Error> {
        let Exchange::SendBody { writer, .. } = &mut self.exchange else {
            return Err(Error::ExchangeAborted);
        };

        let mut out = Vec::new();
        writer.finish(&mut out)?;

        self.send(&out)
    }

    fn flush_body(&mut self) -> Result<(), Error> {
        if let Err(e) = self.transport.flush() {
            self.fail();
            return Err(e.into());
        }
        Ok(())
    }

    fn read_body(&mut self, output: &mut [u8]) -> Result<usize, Error> {
        if output.is_empty() {
            return Ok(0);
        }

        loop {
            let Exchange::RecvBody { reader } = &mut self.exchange else {
                return Ok(0);
            };

            if !self.input.is_empty() {
                let (input_used, output_used) = match reader.read(&self.input, output) {
                    Ok(v) => v,
                    Err(e) => {
                        self.fail();
                        return Err(e);
                    }
                };

                self.input.drain(..input_used);
                let ended = reader.is_ended();

                if ended {
                    self.finish_exchange();
                }

                if output_used > 0 || ended {
                    return Ok(output_used);
                }

                if input_used > 0 {
                    continue;
                }
            } else if reader.is_ended() {
                self.finish_exchange();
                return Ok(0);
            }

            let n = match self.fill_input() {
                Ok(n) => n,
                Err(e) => {
                    self.fail();
                    return Err(e);
                }
            };

            if n == 0 {
                let Exchange::RecvBody { reader } = &mut self.exchange else {
                    return Ok(0);
                };

                if let Err(e) = reader.on_eof() {
                    self.fail();
                    return Err(e);
                }

                self.finish_exchange();
                return Ok(0);
            }
        }
    }

    fn body_mode(&self) -> Option<BodyMode> {
        match &self.exchange {
            Exchange::RecvBody { reader } => Some(reader.body_mode()),
            _ => None,
        }
    }

    fn is_body_ended(&self) -> bool {
        !matches!(self.exchange, Exchange::RecvBody { .. })
    }
}

impl<T: Transport> Drop for ClientSession<T> {
    fn drop(&mut self) {
        if self.transport.is_connected() {
            debug!("Close connection on drop");
            self.transport.close();
        }
    }
}

impl<T: Transport> std::fmt::Debug for ClientSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("proxy", &self.proxy())
            .field("keep_alive", &self.keep_alive)
            .field("state", &self.state)
            .field("exchange", &self.exchange)
            .finish()
    }
}
