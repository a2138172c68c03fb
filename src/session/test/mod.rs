use std::io::Read;

use http::{Request, Response};

use super::ClientSession;
use crate::Error;

use transport::MockTransport;



const OK_HELLO: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello";

const NO_CONTENT: &[u8] = b"HTTP/1.1 204 No Content\r\n\r\n";

fn session() -> ClientSession<MockTransport> {
    ClientSession::new(MockTransport::default(), "example.test", 8080)
}

fn get(path: &str) -> Request<()> {
    Request::get(path).body(()).unwrap()
}

/// Run one bodyless exchange, reading the response body to the end.
fn exchange(
    session: &mut ClientSession<MockTransport>,
    request: &mut Request<()>,
) -> Result<(Response<()>, Vec<u8>), Error> {
    session.begin_request(request)?;

    let mut response = Response::default();
    let mut body = session.end_response(&mut response)?;

    let mut data = Vec::new();
    body.read_to_end(&mut data).map_err(Error::from)?;

    Ok((response, data))
}
