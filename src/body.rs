use std::fmt;
use std::io::Write;

use http::{header, HeaderMap, Method, StatusCode};

use crate::ext::{HeaderMapExt, StatusExt};
use crate::Error;

/// How the body of a request or response is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body at all.
    NoBody,
    /// Body with a `content-length` header.
    LengthDelimited(u64),
    /// `transfer-encoding: chunked`
    Chunked,
    /// Body runs until the connection is closed.
    CloseDelimited,
}

// //////////////////////////////////////////////////////////////////////////////////////////// WRITER

/// Encoder of the request body.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyWriter {
    LengthDelimited { left: u64 },
    Chunked { ended: bool },
}

impl BodyWriter {
    pub fn new_none() -> Self {
        BodyWriter::LengthDelimited { left: 0 }
    }

    pub fn new_chunked() -> Self {
        BodyWriter::Chunked { ended: false }
    }

    pub fn new_sized(size: u64) -> Self {
        BodyWriter::LengthDelimited { left: size }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, BodyWriter::Chunked { .. })
    }

    /// For length delimited bodies, the number of bytes still to send.
    pub fn left_to_send(&self) -> Option<u64> {
        match self {
            BodyWriter::LengthDelimited { left } => Some(*left),
            BodyWriter::Chunked { .. } => None,
        }
    }

    pub fn is_ended(&self) -> bool {
        match self {
            BodyWriter::LengthDelimited { left } => *left == 0,
            BodyWriter::Chunked { ended } => *ended,
        }
    }

    /// Encode `input` into `out`.
    ///
    /// An empty `input` is a no-op, use `finish()` to end a chunked body.
    pub fn write(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Error> {
        if input.is_empty() {
            return Ok(());
        }

        if self.is_ended() {
            return Err(Error::BodyContentAfterFinish);
        }

        match self {
            BodyWriter::LengthDelimited { left } => {
                if input.len() as u64 > *left {
                    return Err(Error::BodyLargerThanContentLength);
                }
                *left -= input.len() as u64;
                out.extend_from_slice(input);
            }
            BodyWriter::Chunked { .. } => {
                // Writing to a Vec is infallible.
                let _ = write!(out, "{:x}\r\n", input.len());
                out.extend_from_slice(input);
                out.extend_from_slice(b"\r\n");
            }
        }

        Ok(())
    }

    /// End the body, writing the chunked terminator if needed.
    pub fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            BodyWriter::LengthDelimited { left } => {
                if *left > 0 {
                    return Err(Error::BodyShorterThanContentLength);
                }
            }
            BodyWriter::Chunked { ended } => {
                if !*ended {
                    out.extend_from_slice(b"0\r\n\r\n");
                    *ended = true;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BodyWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LengthDelimited { left } => write!(f, "LengthDelimited({})", left),
            Self::Chunked { .. } => write!(f, "Chunked"),
        }
    }
}

// //////////////////////////////////////////////////////////////////////////////////////////// READER

/// Decoder of the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyReader {
    NoBody,
    LengthDelimited(u64),
    Chunked(Dechunker),
    CloseDelimited { ended: bool },
}

impl BodyReader {
    /// Pick the body mode of a response.
    ///
    /// HEAD requests, 2xx responses to CONNECT and 1xx/204/304 responses never
    /// have a body. Otherwise `transfer-encoding: chunked` wins over
    /// `content-length`, and a response with neither is delimited by the server
    /// closing the connection.
    pub fn for_response(
        method: &Method,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Result<Self, Error> {
        if *method == Method::HEAD || status.is_bodyless() {
            return Ok(BodyReader::NoBody);
        }

        // The connection becomes a tunnel.
        if *method == Method::CONNECT && status.is_success() {
            return Ok(BodyReader::NoBody);
        }

        if headers.has(header::TRANSFER_ENCODING, "chunked") {
            return Ok(BodyReader::Chunked(Dechunker::default()));
        }

        // A bad length from the server is a protocol error, not a bad request.
        let len = content_length(headers).map_err(|e| match e {
            Error::TooManyContentLengthHeaders => Error::ResponseTooManyContentLength,
            Error::BadContentLengthHeader => Error::ResponseBadContentLength,
            e => e,
        })?;

        if let Some(len) = len {
            return Ok(BodyReader::LengthDelimited(len));
        }

        Ok(BodyReader::CloseDelimited { ended: false })
    }

    pub fn body_mode(&self) -> BodyMode {
        match self {
            BodyReader::NoBody => BodyMode::NoBody,
            BodyReader::LengthDelimited(n) => BodyMode::LengthDelimited(*n),
            BodyReader::Chunked(_) => BodyMode::Chunked,
            BodyReader::CloseDelimited { .. } => BodyMode::CloseDelimited,
        }
    }

    pub fn is_ended(&self) -> bool {
        match self {
            BodyReader::NoBody => true,
            BodyReader::LengthDelimited(left) => *left == 0,
            BodyReader::Chunked(d) => d.is_ended(),
            BodyReader::CloseDelimited { ended } => *ended,
        }
    }

    pub fn is_close_delimited(&self) -> bool {
        matches!(self, BodyReader::CloseDelimited { .. })
    }

    /// Decode from `input` into `output`.
    ///
    /// Returns `(input consumed, output used)`. A result of `(0, 0)` when the
    /// body is not ended means more input is needed.
    pub fn read(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        match self {
            BodyReader::NoBody => Ok((0, 0)),
            BodyReader::LengthDelimited(left) => {
                let max = (*left).min(usize::MAX as u64) as usize;
                let n = input.len().min(output.len()).min(max);
                output[..n].copy_from_slice(&input[..n]);
                *left -= n as u64;
                Ok((n, n))
            }
            BodyReader::Chunked(d) => d.read(input, output),
            BodyReader::CloseDelimited { .. } => {
                let n = input.len().min(output.len());
                output[..n].copy_from_slice(&input[..n]);
                Ok((n, n))
            }
        }
    }

    /// The connection reached EOF.
    ///
    /// Only a close delimited body is allowed to end this way.
    pub fn on_eof(&mut self) -> Result<(), Error> {
        if let BodyReader::CloseDelimited { ended } = self {
            *ended = true;
            return Ok(());
        }

        if self.is_ended() {
            Ok(())
        } else {
            Err(Error::ConnectionClosed)
        }
    }
}

/// Parse the `content-length` header, if there is one.
pub(crate) fn content_length(headers: &HeaderMap) -> Result<Option<u64>, Error> {
    let mut values = headers.get_all(header::CONTENT_LENGTH).iter();

    let Some(value) = values.next() else {
        return Ok(None);
    };

    if values.next().is_some() {
        return Err(Error::TooManyContentLengthHeaders);
    }

    let len = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or(Error::BadContentLengthHeader)?;

    Ok(Some(len))
}

// //////////////////////////////////////////////////////////////////////////////////////////// CHUNKED

/// Max length of a chunk size line or a trailer line, excluding the CRLF.
const MAX_CHUNK_LINE: usize = 4 * 1024;

/// Incremental decoder of `transfer-encoding: chunked`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dechunker {
    phase: ChunkPhase,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ChunkPhase {
    #[default]
    Size,
    Data(u64),
    DataCrLf,
    Trailer,
    Ended,
}

impl Dechunker {
    pub fn is_ended(&self) -> bool {
        self.phase == ChunkPhase::Ended
    }

    fn read(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize), Error> {
        let mut input_used = 0;
        let mut output_used = 0;

        loop {
            let rest = &input[input_used..];

            match self.phase {
                ChunkPhase::Size => {
                    let Some(line_len) = find_line(rest)? else {
                        break;
                    };
                    let size = parse_chunk_size(&rest[..line_len])?;
                    input_used += line_len + 2;
                    self.phase = if size == 0 {
                        ChunkPhase::Trailer
                    } else {
                        ChunkPhase::Data(size)
                    };
                }

                ChunkPhase::Data(left) => {
                    let out = &mut output[output_used..];
                    let max = left.min(usize::MAX as u64) as usize;
                    let n = rest.len().min(out.len()).min(max);
                    if n == 0 {
                        break;
                    }
                    out[..n].copy_from_slice(&rest[..n]);
                    input_used += n;
                    output_used += n;
                    let left = left - n as u64;
                    self.phase = if left == 0 {
                        ChunkPhase::DataCrLf
                    } else {
                        ChunkPhase::Data(left)
                    };
                }

                ChunkPhase::DataCrLf => {
                    if rest.len() < 2 {
                        break;
                    }
                    if &rest[..2] != b"\r\n" {
                        return Err(Error::ChunkExpectedCrLf);
                    }
                    input_used += 2;
                    self.phase = ChunkPhase::Size;
                }

                ChunkPhase::Trailer => {
                    // Trailer fields are discarded, the blank line ends the body.
                    let Some(line_len) = find_line(rest)? else {
                        break;
                    };
                    input_used += line_len + 2;
                    if line_len == 0 {
                        self.phase = ChunkPhase::Ended;
                    }
                }

                ChunkPhase::Ended => break,
            }
        }

        Ok((input_used, output_used))
    }
}

/// Find the end of a size or trailer line, which can't exceed [`MAX_CHUNK_LINE`].
fn find_line(input: &[u8]) -> Result<Option<usize>, Error> {
    let window = &input[..input.len().min(MAX_CHUNK_LINE + 2)];

    match window.windows(2).position(|w| w == b"\r\n") {
        Some(n) => Ok(Some(n)),
        None if window.len() == MAX_CHUNK_LINE + 2 => Err(Error::ChunkLineTooLong),
        None => Ok(None),
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    if !line.is_ascii() {
        return Err(Error::ChunkLenNotAscii);
    }

    // Safe since we checked ascii above.
    let line = std::str::from_utf8(line).map_err(|_| Error::ChunkLenNotAscii)?;

    // Chunk extensions follow a ;
    let size = line.split(';').next().unwrap_or_default().trim();

    u64::from_str_radix(size, 16).map_err(|_| Error::ChunkLenNotANumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dechunk(input: &[u8]) -> Result<(Vec<u8>, usize, bool), Error> {
        let mut d = Dechunker::default();
        let mut output = vec![0; 1024];
        let (i, o) = d.read(input, &mut output)?;
        output.truncate(o);
        Ok((output, i, d.is_ended()))
    }

    #[test]
    fn chunked_writer() {
        let mut w = BodyWriter::new_chunked();
        let mut out = vec![];
        w.write(b"hallo", &mut out).unwrap();
        w.write(&[], &mut out).unwrap();
        assert!(!w.is_ended());
        w.finish(&mut out).unwrap();
        assert!(w.is_ended());
        assert_eq!(out, b"5\r\nhallo\r\n0\r\n\r\n");

        let err = w.write(b"more", &mut out).unwrap_err();
        assert_eq!(err, Error::BodyContentAfterFinish);
    }

    #[test]
    fn sized_writer() {
        let mut w = BodyWriter::new_sized(5);
        let mut out = vec![];
        assert_eq!(
            w.write(b"too much", &mut out).unwrap_err(),
            Error::BodyLargerThanContentLength
        );
        w.write(b"ha", &mut out).unwrap();
        assert_eq!(
            w.finish(&mut out).unwrap_err(),
            Error::BodyShorterThanContentLength
        );
        w.write(b"llo", &mut out).unwrap();
        w.finish(&mut out).unwrap();
        assert_eq!(out, b"hallo");
    }

    #[test]
    fn none_writer_refuses_body() {
        let mut w = BodyWriter::new_none();
        let mut out = vec![];
        assert!(w.is_ended());
        w.finish(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(
            w.write(b"x", &mut out).unwrap_err(),
            Error::BodyContentAfterFinish
        );
    }

    #[test]
    fn dechunk_complete() {
        let input = b"5\r\nhello\r\n6; ext=1\r\n world\r\n0\r\n\r\n";
        let (out, used, ended) = dechunk(input).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(used, input.len());
        assert!(ended);
    }

    #[test]
    fn dechunk_with_trailer() {
        let (out, _, ended) = dechunk(b"2\r\nhi\r\n0\r\nx-trailer: yes\r\n\r\n").unwrap();
        assert_eq!(out, b"hi");
        assert!(ended);
    }

    #[test]
    fn dechunk_partial_size_line() {
        let (out, used, ended) = dechunk(b"5\r\nhello\r\n1").unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(used, 10);
        assert!(!ended);
    }

    #[test]
    fn dechunk_errors() {
        assert_eq!(
            dechunk(b"\xFF\r\ndata\r\n").unwrap_err(),
            Error::ChunkLenNotAscii
        );
        assert_eq!(
            dechunk(b"xyz\r\ndata\r\n").unwrap_err(),
            Error::ChunkLenNotANumber
        );
        assert_eq!(
            dechunk(b"5\r\nabcdefghij\r\n").unwrap_err(),
            Error::ChunkExpectedCrLf
        );
    }

    #[test]
    fn chunk_line_limit() {
        let mut input = "0".repeat(MAX_CHUNK_LINE - 1);
        input.push_str("5\r\nhello\r\n0\r\n\r\n");
        let (output, _, ended) = dechunk(input.as_bytes()).unwrap();
        assert_eq!(output, b"hello");
        assert!(ended);

        // Without a CRLF in sight, a short line waits for more input.
        let (output, used, ended) = dechunk("1".repeat(100).as_bytes()).unwrap();
        assert!(output.is_empty());
        assert_eq!(used, 0);
        assert!(!ended);

        let long = "1".repeat(MAX_CHUNK_LINE + 2);
        assert_eq!(
            dechunk(long.as_bytes()).unwrap_err(),
            Error::ChunkLineTooLong
        );

        let mut trailer = String::from("0\r\nx-trailer: ");
        trailer.push_str(&"a".repeat(MAX_CHUNK_LINE));
        assert_eq!(
            dechunk(trailer.as_bytes()).unwrap_err(),
            Error::ChunkLineTooLong
        );
    }

    #[test]
    fn bad_response_content_length_is_protocol() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "abc".parse().unwrap());
        let err = BodyReader::for_response(&Method::GET, StatusCode::OK, &headers).unwrap_err();
        assert_eq!(err, Error::ResponseBadContentLength);
        assert_eq!(err.category(), crate::ErrorCategory::Protocol);

        headers.insert(header::CONTENT_LENGTH, "1".parse().unwrap());
        headers.append(header::CONTENT_LENGTH, "2".parse().unwrap());
        let err = BodyReader::for_response(&Method::GET, StatusCode::OK, &headers).unwrap_err();
        assert_eq!(err, Error::ResponseTooManyContentLength);
    }

    #[test]
    fn response_body_modes() {
        let mut headers = HeaderMap::new();
        let mode = |m: &Method, s: u16, h: &HeaderMap| {
            BodyReader::for_response(m, StatusCode::from_u16(s).unwrap(), h)
                .unwrap()
                .body_mode()
        };

        assert_eq!(mode(&Method::HEAD, 200, &headers), BodyMode::NoBody);
        assert_eq!(mode(&Method::GET, 204, &headers), BodyMode::NoBody);
        assert_eq!(mode(&Method::GET, 304, &headers), BodyMode::NoBody);
        assert_eq!(mode(&Method::GET, 101, &headers), BodyMode::NoBody);
        assert_eq!(mode(&Method::CONNECT, 200, &headers), BodyMode::NoBody);
        assert_eq!(mode(&Method::CONNECT, 407, &headers), BodyMode::CloseDelimited);
        assert_eq!(mode(&Method::GET, 200, &headers), BodyMode::CloseDelimited);

        headers.insert(header::CONTENT_LENGTH, "12".parse().unwrap());
        assert_eq!(mode(&Method::GET, 200, &headers), BodyMode::LengthDelimited(12));

        headers.insert(header::TRANSFER_ENCODING, "chunked".parse().unwrap());
        assert_eq!(mode(&Method::GET, 200, &headers), BodyMode::Chunked);
    }

    #[test]
    fn bad_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "ten".parse().unwrap());
        assert_eq!(
            content_length(&headers).unwrap_err(),
            Error::BadContentLengthHeader
        );

        headers.append(header::CONTENT_LENGTH, "10".parse().unwrap());
        assert_eq!(
            content_length(&headers).unwrap_err(),
            Error::TooManyContentLengthHeaders
        );
    }

    #[test]
    fn eof_handling() {
        let mut r = BodyReader::CloseDelimited { ended: false };
        r.on_eof().unwrap();
        assert!(r.is_ended());

        let mut r = BodyReader::LengthDelimited(3);
        assert_eq!(r.on_eof().unwrap_err(), Error::ConnectionClosed);

        let mut r = BodyReader::LengthDelimited(0);
        r.on_eof().unwrap();
    }
}
