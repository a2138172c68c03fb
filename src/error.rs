use std::fmt;
use std::io;

use http::{Method, Version};

/// Error type for h1-session
#[derive(Debug, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    ConnectedSession(&'static str),
    BadHeader(String),
    BadUri(String),
    UnsupportedVersion,
    MethodVersionMismatch(Method, Version),
    TooManyHostHeaders,
    TooManyContentLengthHeaders,
    BadContentLengthHeader,
    RequestBodyPending,
    ResponseWithoutRequest,
    ExchangeAborted,
    BodyContentAfterFinish,
    BodyLargerThanContentLength,
    BodyShorterThanContentLength,
    HttpParseFail(String),
    HttpParseTooManyHeaders,
    ResponseHeadTooLarge,
    IncompleteResponse,
    ResponseBadContentLength,
    ResponseTooManyContentLength,
    ChunkLenNotAscii,
    ChunkLenNotANumber,
    ChunkExpectedCrLf,
    ChunkLineTooLong,
    ConnectionClosed,
    StaleConnection,
    Io(io::ErrorKind, String),
}

/// Broad classes of [`Error`].
///
/// * `Config` - connection parameters changed at the wrong time, or a request
///   that cannot be sent as given.
/// * `Lifecycle` - session operations invoked out of the
///   `begin_request -> write body -> end_response -> read body` order.
/// * `Protocol` - the peer sent something that is not valid HTTP/1.1.
/// * `Network` - connect, read or write failed at the transport boundary.
///
/// Only `Network` errors are ever retried, and only inside `begin_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Programming error in the session configuration or request.
    Config,
    /// Programming error in the order of operations.
    Lifecycle,
    /// Malformed data from the peer.
    Protocol,
    /// Transport failure.
    Network,
}

impl Error {
    /// Which broad class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ConnectedSession(_)
            | Error::BadHeader(_)
            | Error::BadUri(_)
            | Error::UnsupportedVersion
            | Error::MethodVersionMismatch(_, _)
            | Error::TooManyHostHeaders
            | Error::TooManyContentLengthHeaders
            | Error::BadContentLengthHeader => ErrorCategory::Config,

            Error::RequestBodyPending
            | Error::ResponseWithoutRequest
            | Error::ExchangeAborted
            | Error::BodyContentAfterFinish
            | Error::BodyLargerThanContentLength
            | Error::BodyShorterThanContentLength => ErrorCategory::Lifecycle,

            Error::HttpParseFail(_)
            | Error::HttpParseTooManyHeaders
            | Error::ResponseHeadTooLarge
            | Error::IncompleteResponse
            | Error::ResponseBadContentLength
            | Error::ResponseTooManyContentLength
            | Error::ChunkLenNotAscii
            | Error::ChunkLenNotANumber
            | Error::ChunkExpectedCrLf
            | Error::ChunkLineTooLong => ErrorCategory::Protocol,

            Error::ConnectionClosed | Error::StaleConnection | Error::Io(_, _) => {
                ErrorCategory::Network
            }
        }
    }

    /// Convert to `std::io::Error` for use in `Read`/`Write` impls.
    ///
    /// Transport errors keep their original `io::ErrorKind`.
    pub fn into_io(self) -> io::Error {
        let kind = match &self {
            Error::Io(kind, _) => *kind,
            Error::ConnectionClosed => io::ErrorKind::UnexpectedEof,
            Error::StaleConnection => io::ErrorKind::ConnectionAborted,
            _ => match self.category() {
                ErrorCategory::Protocol => io::ErrorKind::InvalidData,
                _ => io::ErrorKind::InvalidInput,
            },
        };
        io::Error::new(kind, self)
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::HttpParseFail(value.to_string())
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Io(value.kind(), value.to_string())
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectedSession(v) => write!(f, "cannot change {} while connected", v),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::BadUri(v) => write!(f, "bad request uri: {}", v),
            Error::UnsupportedVersion => write!(f, "unsupported http version"),
            Error::MethodVersionMismatch(m, v) => {
                write!(f, "{} not valid for HTTP version {:?}", m, v)
            }
            Error::TooManyHostHeaders => write!(f, "more than one host header"),
            Error::TooManyContentLengthHeaders => write!(f, "more than one content-length header"),
            Error::BadContentLengthHeader => write!(f, "content-length header not a number"),
            Error::RequestBodyPending => {
                write!(f, "previous request is not finished with end_response()")
            }
            Error::ResponseWithoutRequest => {
                write!(f, "end_response() without a preceding begin_request()")
            }
            Error::ExchangeAborted => write!(f, "exchange was aborted by an earlier error"),
            Error::BodyContentAfterFinish => {
                write!(f, "attempt to stream body after finishing it")
            }
            Error::BodyLargerThanContentLength => {
                write!(f, "attempt to write larger body than content-length")
            }
            Error::BodyShorterThanContentLength => {
                write!(f, "request body ended before content-length was sent")
            }
            Error::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            Error::HttpParseTooManyHeaders => write!(f, "http parse resulted in too many headers"),
            Error::ResponseHeadTooLarge => write!(f, "response header block is too large"),
            Error::IncompleteResponse => {
                write!(f, "connection closed in the middle of the response header")
            }
            Error::ResponseBadContentLength => {
                write!(f, "response content-length header not a number")
            }
            Error::ResponseTooManyContentLength => {
                write!(f, "response has more than one content-length header")
            }
            Error::ChunkLenNotAscii => write!(f, "chunk length is not ascii"),
            Error::ChunkLenNotANumber => write!(f, "chunk length cannot be read as a number"),
            Error::ChunkExpectedCrLf => write!(f, "chunk expected crlf as next character"),
            Error::ChunkLineTooLong => write!(f, "chunk size or trailer line is too long"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
            Error::StaleConnection => write!(f, "connection still stale after reconnect"),
            Error::Io(k, v) => write!(f, "io error ({:?}): {}", k, v),
        }
    }
}
