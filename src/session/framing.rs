use http::uri::{PathAndQuery, Scheme};
use http::{HeaderValue, Method, Uri};

use crate::ext::{MethodExt, SchemeExt};
use crate::transport::Address;
use crate::Error;

/// Forward proxy settings of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Proxy {
    pub host: String,
    pub port: u16,
}

/// How a request is put on the wire.
///
/// Chosen once per exchange from the method and the proxy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// Connect to the target, origin-form request target: `/path?query`
    Direct,
    /// Connect to the proxy, absolute-form request target: `http://host:port/path?query`
    Forward,
    /// Connect to the proxy (or target without proxy), authority-form
    /// request target: `host:port`
    Tunnel,
}

impl Framing {
    pub fn select(method: &Method, proxy: Option<&Proxy>) -> Framing {
        if method.is_tunnel() {
            Framing::Tunnel
        } else if proxy.is_some() {
            Framing::Forward
        } else {
            Framing::Direct
        }
    }

    pub fn is_proxied(&self, proxy: Option<&Proxy>) -> bool {
        match self {
            Framing::Direct => false,
            Framing::Forward => true,
            Framing::Tunnel => proxy.is_some(),
        }
    }

    /// The address the transport must be connected to.
    pub fn address(&self, target: &Target<'_>) -> Address {
        match (self, target.proxy) {
            (Framing::Forward | Framing::Tunnel, Some(p)) => Address::new(p.host.clone(), p.port),
            _ => Address::new(target.host, target.port),
        }
    }

    /// The request-target to send for `uri`.
    ///
    /// Only the path and query of `uri` are used, the host and port always
    /// come from the session.
    pub fn request_target(&self, target: &Target<'_>, uri: &Uri) -> Result<Uri, Error> {
        let path_and_query = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let result = match self {
            Framing::Direct => Uri::builder().path_and_query(path_and_query).build(),
            Framing::Forward => Uri::builder()
                .scheme(target.scheme.clone())
                .authority(authority(target.host, target.port))
                .path_and_query(path_and_query)
                .build(),
            Framing::Tunnel => authority(target.host, target.port).parse::<Uri>().map_err(Into::into),
        };

        result.map_err(|e| Error::BadUri(e.to_string()))
    }
}

/// The target of a session, as seen by one exchange.
pub(crate) struct Target<'a> {
    pub host: &'a str,
    pub port: u16,
    pub scheme: &'a Scheme,
    pub proxy: Option<&'a Proxy>,
}

impl Target<'_> {
    /// Value for the `host` header.
    ///
    /// The port is left out when it is the default for the scheme.
    pub fn host_header(&self) -> Result<HeaderValue, Error> {
        let value = if self.scheme.default_port() == Some(self.port) {
            bracketed(self.host)
        } else {
            authority(self.host, self.port)
        };

        HeaderValue::from_str(&value).map_err(|e| Error::BadHeader(e.to_string()))
    }
}

fn authority(host: &str, port: u16) -> String {
    format!("{}:{}", bracketed(host), port)
}

// IPv6 literals need brackets to be told apart from the port.
fn bracketed(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}
