//! Lenient URL host extraction
//!
//! Only the host of a URL is ever needed (for first/third-party checks and
//! hierarchical domain constraints), so this module slices it out of the
//! string without a full parser and without allocating.

/// Get the position after "://", validating the scheme.
///
/// Returns `Ok(None)` if the URL has no authority component and `Err(())`
/// if the text before `:` cannot be a scheme.
#[inline]
fn get_authority_start(url: &str) -> Result<Option<usize>, ()> {
    let bytes = url.as_bytes();

    if bytes.starts_with(b"//") {
        return Ok(Some(2));
    }

    let colon_pos = match bytes.iter().position(|&b| b == b':' || b == b'/') {
        Some(pos) if bytes[pos] == b':' => pos,
        _ => return Ok(None),
    };

    if colon_pos == 0 {
        return Err(());
    }

    let scheme = &bytes[..colon_pos];
    let valid_scheme = scheme[0].is_ascii_alphabetic()
        && scheme
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.');
    if !valid_scheme {
        return Err(());
    }

    if bytes.len() >= colon_pos + 3 && &bytes[colon_pos + 1..colon_pos + 3] == b"//" {
        return Ok(Some(colon_pos + 3));
    }

    // Opaque URL such as "about:blank" or "data:..."
    Ok(None)
}

/// Extract the host (with port, without userinfo) of `url`.
///
/// A URL without an authority (e.g. a bare hostname or `about:blank`) has
/// an empty host. Returns `None` if the text is not a parseable URL:
/// control characters, a malformed scheme, or whitespace in the host.
pub fn host_of(url: &str) -> Option<&str> {
    if url.bytes().any(|b| b.is_ascii_control()) {
        return None;
    }

    let start = match get_authority_start(url).ok()? {
        Some(start) => start,
        None => return Some(""),
    };

    let bytes = url.as_bytes();
    let mut end = bytes.len();
    for (i, &b) in bytes[start..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            end = start + i;
            break;
        }
    }

    let authority = &url[start..end];
    let host = match authority.rfind('@') {
        Some(at_pos) => &authority[at_pos + 1..],
        None => authority,
    };

    if host.bytes().any(|b| b == b' ') {
        return None;
    }

    Some(host)
}

/// Return the hostname of `src` if it looks like a URL, else `src` itself.
///
/// Sources are sometimes page URLs and sometimes bare domains.
pub fn source_host(src: &str) -> &str {
    match host_of(src) {
        Some(host) if !host.is_empty() => strip_port(host),
        _ => src,
    }
}

#[inline]
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host;
    }
    match host.rfind(':') {
        Some(pos) if host[pos + 1..].bytes().all(|b| b.is_ascii_digit()) => &host[..pos],
        _ => host,
    }
}
