/// Log a header block at trace level.
///
/// Each line of the block is logged separately, non-printable bytes are
/// escaped.
pub(crate) fn log_data(data: &[u8]) {
    if !log_enabled!(log::Level::Trace) {
        return;
    }

    for line in data.split(|c| *c == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        trace!("{}", line.escape_ascii());
    }
}

/// Case insensitive comparison of a header value against an expected lowercase token.
///
/// The value may be a comma separated list, in which case any element matching is enough.
pub(crate) fn contains_token(value: &[u8], token_lowercase: &str) -> bool {
    value
        .split(|c| *c == b',')
        .map(trim)
        .any(|t| t.eq_ignore_ascii_case(token_lowercase.as_bytes()))
}

fn trim(mut v: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = v {
        if !first.is_ascii_whitespace() {
            break;
        }
        v = rest;
    }
    while let [rest @ .., last] = v {
        if !last.is_ascii_whitespace() {
            break;
        }
        v = rest;
    }
    v
}
