//! Canonical request and string-to-sign construction for AWS Signature Version 4.
//!
//! The canonical request has the form:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! and the string to sign:
//!
//! ```text
//! AWS4-HMAC-SHA256\n
//! <ISO8601 timestamp>\n
//! <credential scope>\n
//! <hex(SHA256(canonical request))>
//! ```

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// The header signing algorithm identifier.
pub const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Characters percent-encoded in URI path segments.
///
/// Everything except the unreserved set (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`).
/// Forward slashes are handled by splitting, so they never reach the encoder.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the full canonical request string from its components.
///
/// # Errors
///
/// Returns [`AuthError::InvalidPath`] if the path contains `.` or `..`
/// segments or does not decode to UTF-8, and
/// [`AuthError::MalformedAuthHeader`] if a signed header is absent.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "GET",
///     "/test.txt",
///     "",
///     &[("host", "examplebucket.s3.amazonaws.com")],
///     &["host"],
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// )
/// .unwrap();
/// assert!(canonical.starts_with("GET\n/test.txt\n"));
/// ```
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> Result<String, AuthError> {
    let canonical_uri = build_canonical_uri(uri)?;
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers)?;
    let signed_headers_str = build_signed_headers_string(signed_headers);

    Ok(format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    ))
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Each segment is percent-decoded exactly once and then re-encoded, so an
/// already-encoded path and its raw form canonicalize identically. `.` and
/// `..` segments are rejected rather than resolved.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/test.txt").unwrap(), "/test.txt");
/// assert_eq!(build_canonical_uri("").unwrap(), "/");
/// assert!(build_canonical_uri("/bucket/../etc/passwd").is_err());
/// ```
pub fn build_canonical_uri(path: &str) -> Result<String, AuthError> {
    if path.is_empty() || path == "/" {
        return Ok("/".to_owned());
    }

    let encoded_segments = path
        .split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|_| AuthError::InvalidPath("path is not valid UTF-8".to_owned()))?;
            if decoded == "." || decoded == ".." {
                return Err(AuthError::InvalidPath(
                    "relative path segments are not allowed".to_owned(),
                ));
            }
            Ok(uri_encode(&decoded))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(encoded_segments.join("/"))
}

/// Build the canonical query string.
///
/// `key=value` pairs are ordered by key, then value. A bare `key` becomes
/// `key=`. Components stay exactly as sent, since clients differ in which
/// reserved characters they escape and sign what they put on the wire.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// assert_eq!(build_canonical_query_string("location"), "location=");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();
    params.sort_unstable();

    let mut canonical = String::with_capacity(query.len() + params.len());
    for (key, value) in params {
        if !canonical.is_empty() {
            canonical.push('&');
        }
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
    }
    canonical
}

/// Build the canonical headers block for `signed_headers`.
///
/// `headers` may repeat a name; the values are joined with commas in the
/// order given. Names match case-insensitively and are emitted lowercased and
/// sorted. The block has no trailing newline.
///
/// # Errors
///
/// Returns [`AuthError::MalformedAuthHeader`] if a signed header has no value
/// in `headers`.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_canonical_headers;
///
/// let result = build_canonical_headers(
///     &[("Host", "example.com"), ("X-Amz-Date", "20130524T000000Z")],
///     &["host", "x-amz-date"],
/// )
/// .unwrap();
/// assert_eq!(result, "host:example.com\nx-amz-date:20130524T000000Z");
/// assert!(build_canonical_headers(&[], &["host"]).is_err());
/// ```
pub fn build_canonical_headers(
    headers: &[(&str, &str)],
    signed_headers: &[&str],
) -> Result<String, AuthError> {
    let mut names: Vec<String> = signed_headers
        .iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    names.sort_unstable();

    let mut lines = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<String> = headers
            .iter()
            .filter(|(header, _)| header.eq_ignore_ascii_case(&name))
            .map(|(_, value)| canonical_header_value(value))
            .collect();
        if values.is_empty() {
            return Err(AuthError::malformed(format!(
                "signed header '{name}' is missing"
            )));
        }
        lines.push(format!("{name}:{}", values.join(",")));
    }
    Ok(lines.join("\n"))
}

/// Build the signed headers string as a sorted, semicolon-separated list.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Hex SHA-256 of a canonical request.
#[must_use]
pub fn hash_canonical_request(canonical_request: &str) -> String {
    hex::encode(Sha256::digest(canonical_request.as_bytes()))
}

/// Build the SigV4 string to sign.
///
/// # Examples
///
/// ```
/// use bucketfs_auth::canonical::build_string_to_sign;
///
/// let sts = build_string_to_sign(
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "7344ae5b7ee6c3e7e6b0fe0640412a37625d1fbfff95c48bbb2dc43964946972",
/// );
/// assert!(sts.starts_with("AWS4-HMAC-SHA256\n20130524T000000Z\n"));
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{SIGNING_ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

/// Trim a header value and collapse each interior whitespace run to a space.
fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
