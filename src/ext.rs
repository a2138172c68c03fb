use http::uri::Scheme;
use http::{HeaderMap, HeaderName, Method, StatusCode, Version};

use crate::util::contains_token;
use crate::Error;

pub(crate) trait MethodExt {
    fn is_http10(&self) -> bool;
    fn is_http11(&self) -> bool;
    fn need_request_body(&self) -> bool;
    fn is_tunnel(&self) -> bool;
    fn verify_version(&self, version: Version, allow_non_standard: bool) -> Result<(), Error>;
}

impl MethodExt for Method {
    fn is_http10(&self) -> bool {
        self == Method::GET || self == Method::HEAD || self == Method::POST
    }

    fn is_http11(&self) -> bool {
        self == Method::PUT
            || self == Method::DELETE
            || self == Method::CONNECT
            || self == Method::OPTIONS
            || self == Method::TRACE
            || self == Method::PATCH
    }

    fn need_request_body(&self) -> bool {
        self == Method::POST || self == Method::PUT || self == Method::PATCH
    }

    fn is_tunnel(&self) -> bool {
        self == Method::CONNECT
    }

    fn verify_version(&self, version: Version, allow_non_standard: bool) -> Result<(), Error> {
        if version != Version::HTTP_10 && version != Version::HTTP_11 {
            return Err(Error::UnsupportedVersion);
        }

        if allow_non_standard {
            return Ok(());
        }

        let method_ok = self.is_http10() || (version == Version::HTTP_11 && self.is_http11());

        if !method_ok {
            return Err(Error::MethodVersionMismatch(self.clone(), version));
        }

        Ok(())
    }
}

pub(crate) trait HeaderMapExt {
    /// Tell if a header has the (case insensitive) token in its value.
    fn has(&self, name: HeaderName, token_lowercase: &str) -> bool;

    /// Number of values for the header.
    fn count(&self, name: HeaderName) -> usize;
}

impl HeaderMapExt for HeaderMap {
    fn has(&self, name: HeaderName, token_lowercase: &str) -> bool {
        self.get_all(name)
            .iter()
            .any(|v| contains_token(v.as_bytes(), token_lowercase))
    }

    fn count(&self, name: HeaderName) -> usize {
        self.get_all(name).iter().count()
    }
}

pub(crate) trait StatusExt {
    /// Interim responses that are discarded while waiting for the final one.
    fn is_discarded_interim(&self) -> bool;

    /// Responses that never carry a body regardless of headers.
    fn is_bodyless(&self) -> bool;
}

impl StatusExt for StatusCode {
    fn is_discarded_interim(&self) -> bool {
        // 101 is final for this exchange, the connection changes protocol.
        self.is_informational() && *self != StatusCode::SWITCHING_PROTOCOLS
    }

    fn is_bodyless(&self) -> bool {
        self.is_informational() || *self == StatusCode::NO_CONTENT || *self == StatusCode::NOT_MODIFIED
    }
}

pub(crate) trait SchemeExt {
    fn default_port(&self) -> Option<u16>;
}

impl SchemeExt for Scheme {
    fn default_port(&self) -> Option<u16> {
        if *self == Scheme::HTTPS {
            Some(443)
        } else if *self == Scheme::HTTP {
            Some(80)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_not_valid_in_http10() {
        let err = Method::TRACE
            .verify_version(Version::HTTP_10, false)
            .unwrap_err();
        assert_eq!(err, Error::MethodVersionMismatch(Method::TRACE, Version::HTTP_10));
        assert!(Method::TRACE.verify_version(Version::HTTP_11, false).is_ok());
    }

    #[test]
    fn http2_rejected() {
        let err = Method::GET.verify_version(Version::HTTP_2, true).unwrap_err();
        assert_eq!(err, Error::UnsupportedVersion);
    }

    #[test]
    fn non_standard_method() {
        let m = Method::from_bytes(b"FNORD").unwrap();
        assert!(m.verify_version(Version::HTTP_11, false).is_err());
        assert!(m.verify_version(Version::HTTP_11, true).is_ok());
    }

    #[test]
    fn bodyless_statuses() {
        assert!(StatusCode::NO_CONTENT.is_bodyless());
        assert!(StatusCode::NOT_MODIFIED.is_bodyless());
        assert!(StatusCode::SWITCHING_PROTOCOLS.is_bodyless());
        assert!(!StatusCode::OK.is_bodyless());
        assert!(!StatusCode::SWITCHING_PROTOCOLS.is_discarded_interim());
        assert!(StatusCode::CONTINUE.is_discarded_interim());
    }

    #[test]
    fn header_has_token() {
        let mut map = HeaderMap::new();
        map.append(http::header::CONNECTION, "Keep-Alive".parse().unwrap());
        map.append(http::header::CONNECTION, "Close".parse().unwrap());
        assert!(map.has(http::header::CONNECTION, "close"));
        assert!(map.has(http::header::CONNECTION, "keep-alive"));
        assert_eq!(map.count(http::header::CONNECTION), 2);
    }
}
