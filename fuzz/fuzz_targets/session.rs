#![no_main]

use std::io::{self, Read, Write};

use h1_session::http::{Request, Response};
use h1_session::{Address, ClientSession, Transport};
use libfuzzer_sys::fuzz_target;

// List of HTTP methods to randomly choose from
const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "CONNECT"];

/// Serves the fuzz input as whatever the server sends, in chunks of varying size.
struct FuzzTransport<'a> {
    input: &'a [u8],
    chunk: usize,
    connected: bool,
    stale: bool,
}

impl Transport for FuzzTransport<'_> {
    fn connect(&mut self, _: &Address) -> io::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_stale(&mut self) -> bool {
        // Alternate, to cover both the reuse and the reconnect path.
        self.stale = !self.stale;
        self.stale
    }
}

impl Read for FuzzTransport<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.input.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&self.input[..n]);
        self.input = &self.input[n..];
        Ok(n)
    }
}

impl Write for FuzzTransport<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let method = METHODS[(data[0] as usize) % METHODS.len()];
    let keep_alive = data[1] & 1 == 0;
    let proxied = data[1] & 2 == 0;
    let chunk = (data[2] as usize).max(1);
    let rounds = (data[3] % 4) as usize + 1;

    let transport = FuzzTransport {
        input: &data[4..],
        chunk,
        connected: false,
        stale: false,
    };

    let mut session = ClientSession::new(transport, "example.test", 8080);
    let _ = session.set_keep_alive(keep_alive);
    if proxied {
        let _ = session.set_proxy("proxy.test", 3128);
    }

    for _ in 0..rounds {
        let Ok(mut request) = Request::builder().method(method).uri("/fuzz").body(()) else {
            return;
        };

        let Ok(mut body) = session.begin_request(&mut request) else {
            continue;
        };
        let _ = body.write_all(b"fuzz");
        drop(body);

        let mut response = Response::default();
        let Ok(mut body) = session.end_response(&mut response) else {
            continue;
        };

        let mut buf = [0; 256];
        while let Ok(n) = body.read(&mut buf) {
            if n == 0 {
                break;
            }
        }
    }
});
