use http::{HeaderName, HeaderValue, Response, StatusCode, Version};

use crate::Error;

/// Reason phrase of a parsed response.
///
/// The `http` crate has no place for the reason phrase the server sent, so it
/// is kept as a response extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(pub String);

/// Try to parse a complete response head from `input`.
///
/// `Ok(None)` means `input` does not yet hold the entire header block.
/// On success the `usize` is the number of bytes of `input` that make up the
/// head, including the terminating blank line.
pub(crate) fn try_parse_response<const N: usize>(
    input: &[u8],
) -> Result<Option<(usize, Response<()>)>, Error> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut res = httparse::Response::new(&mut headers);

    let input_used = match res.parse(input) {
        Ok(httparse::Status::Complete(v)) => v,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => return Err(Error::HttpParseTooManyHeaders),
        Err(e) => return Err(e.into()),
    };

    let version = match res.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        _ => return Err(Error::HttpParseFail("unsupported http version".into())),
    };

    // httparse guarantees a code for a complete parse.
    let code = res.code.unwrap_or_default();
    let status = StatusCode::from_u16(code)
        .map_err(|_| Error::HttpParseFail(format!("bad status code: {}", code)))?;

    let mut response = Response::new(());
    *response.version_mut() = version;
    *response.status_mut() = status;

    if let Some(reason) = res.reason {
        response
            .extensions_mut()
            .insert(ReasonPhrase(reason.to_string()));
    }

    let map = response.headers_mut();
    map.reserve(res.headers.len());

    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| Error::HttpParseFail(e.to_string()))?;
        let value =
            HeaderValue::from_bytes(h.value).map_err(|e| Error::HttpParseFail(e.to_string()))?;
        map.append(name, value);
    }

    Ok(Some((input_used, response)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_head() {
        let r = try_parse_response::<8>(b"HTTP/1.1 200 OK\r\nContent-Len").unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn complete_head() {
        let input = b"HTTP/1.0 404 Not Here\r\nX-Foo: a\r\nx-foo: b\r\n\r\nbody";
        let (n, res) = try_parse_response::<8>(input).unwrap().unwrap();
        assert_eq!(n, input.len() - 4);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.version(), Version::HTTP_10);
        assert_eq!(res.headers().get_all("x-foo").iter().count(), 2);
        assert_eq!(
            res.extensions().get::<ReasonPhrase>(),
            Some(&ReasonPhrase("Not Here".into()))
        );
    }

    #[test]
    fn too_many_headers() {
        let input = b"HTTP/1.1 200 OK\r\na: 1\r\nb: 2\r\n\r\n";
        let err = try_parse_response::<1>(input).unwrap_err();
        assert_eq!(err, Error::HttpParseTooManyHeaders);
    }

    #[test]
    fn malformed_status_line() {
        let err = try_parse_response::<8>(b"HTTP/1.1200 OK\r\n\r\n").unwrap_err();
        assert!(matches!(err, Error::HttpParseFail(_)));
    }
}
