use std::fmt;
use std::io;

use crate::body::BodyMode;
use crate::transport::Transport;
use crate::Error;

use super::ClientSession;

/// Handle for writing the request body.
///
/// Returned by [`ClientSession::begin_request()`]. The body is encoded according to
/// the request headers, `transfer-encoding: chunked` or `content-length`.
///
/// Dropping the handle without calling [`finish()`][Self::finish] is fine, the
/// body is finalized by [`ClientSession::end_response()`].
pub struct RequestBody<'a, T: Transport> {
    session: &'a mut ClientSession<T>,
}

impl<'a, T: Transport> RequestBody<'a, T> {
    pub(crate) fn new(session: &'a mut ClientSession<T>) -> Self {
        RequestBody { session }
    }

    /// Whether the body is sent with chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        match &self.session.exchange {
            super::Exchange::SendBody { writer, .. } => writer.is_chunked(),
            _ => false,
        }
    }

    /// Bytes left to send for a `content-length` body.
    pub fn left_to_send(&self) -> Option<u64> {
        match &self.session.exchange {
            super::Exchange::SendBody { writer, .. } => writer.left_to_send(),
            _ => None,
        }
    }

    /// End the body.
    ///
    /// Sends the terminating chunk for chunked bodies. Errors with
    /// [`Error::BodyShorterThanContentLength`] if fewer bytes than announced
    /// were written.
    pub fn finish(self) -> Result<(), Error> {
        self.session.finish_body()
    }

    /// Give up on the exchange and close the connection.
    pub fn abandon(self) {
        self.session.abandon();
    }
}

impl<T: Transport> io::Write for RequestBody<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.session.write_body(buf).map_err(Error::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.session.flush_body().map_err(Error::into_io)
    }
}

/// Handle for reading the response body.
///
/// Returned by [`ClientSession::end_response()`]. Reading to the end releases the
/// exchange, and closes the connection if the response demands it.
///
/// A handle dropped before the end leaves the rest of the body unread. The next
/// [`ClientSession::begin_request()`] then closes the connection.
pub struct ResponseBody<'a, T: Transport> {
    session: &'a mut ClientSession<T>,
}

impl<'a, T: Transport> ResponseBody<'a, T> {
    pub(crate) fn new(session: &'a mut ClientSession<T>) -> Self {
        ResponseBody { session }
    }

    /// How the body is delimited, `None` once it is read to the end.
    pub fn body_mode(&self) -> Option<BodyMode> {
        self.session.body_mode()
    }

    /// Whether the entire body has been read.
    pub fn is_ended(&self) -> bool {
        self.session.is_body_ended()
    }

    /// Give up on the rest of the body and close the connection.
    pub fn abandon(self) {
        self.session.abandon();
    }
}

impl<T: Transport> io::Read for ResponseBody<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.session.read_body(buf).map_err(Error::into_io)
    }
}

// ////////////////////////////////////////////////////////////////////////////////////////////

impl<T: Transport> fmt::Debug for RequestBody<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session.exchange {
            super::Exchange::SendBody { writer, .. } => write!(f, "RequestBody({:?})", writer),
            _ => write!(f, "RequestBody(aborted)"),
        }
    }
}

impl<T: Transport> fmt::Debug for ResponseBody<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body_mode() {
            Some(mode) => write!(f, "ResponseBody({:?})", mode),
            None => write!(f, "ResponseBody(ended)"),
        }
    }
}
