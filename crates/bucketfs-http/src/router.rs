//! Path-style request routing.
//!
//! Requests address objects as `/{bucket}/{key...}`. The only bucket-level
//! operation is `GET /{bucket}?location`.

use http::Method;
use percent_encoding::percent_decode_str;

use crate::error::{S3Error, S3ErrorCode};

/// The operations this server implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// `PUT /{bucket}/{key}`.
    PutObject,
    /// `GET /{bucket}/{key}`.
    GetObject,
    /// `HEAD /{bucket}/{key}`.
    HeadObject,
    /// `DELETE /{bucket}/{key}`.
    DeleteObject,
    /// `GET /{bucket}?location`.
    GetBucketLocation,
}

impl S3Operation {
    /// Returns the operation name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
            Self::GetBucketLocation => "GetBucketLocation",
        }
    }
}

/// The result of routing an HTTP request to an S3 operation.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// The bucket name.
    pub bucket: String,
    /// The object key. Always present for object operations.
    pub key: Option<String>,
    /// The identified S3 operation.
    pub operation: S3Operation,
}

impl RoutingContext {
    /// The object key, or an empty string for bucket operations.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }

    /// `bucket/key` for error documents and logs.
    #[must_use]
    pub fn resource(&self) -> String {
        match &self.key {
            Some(key) => format!("{}/{key}", self.bucket),
            None => self.bucket.clone(),
        }
    }
}

/// Resolve a request line to a routing context.
///
/// # Errors
///
/// Returns `MethodNotAllowed` for methods other than GET, PUT, HEAD, and
/// DELETE, `InvalidArgument` when the path does not decode to UTF-8, and
/// `NoSuchKey` when an object operation has no key.
pub fn resolve(method: &Method, uri: &http::Uri) -> Result<RoutingContext, S3Error> {
    if !matches!(
        *method,
        Method::GET | Method::PUT | Method::HEAD | Method::DELETE
    ) {
        return Err(S3Error::method_not_allowed(method.as_str()));
    }

    let path = uri.path();
    let (bucket, key) = parse_path(path)?;
    let Some(bucket) = bucket else {
        return Err(S3Error::no_such_key(path));
    };

    if key.is_none() && *method == Method::GET && query_has_key(uri.query(), "location") {
        return Ok(RoutingContext {
            bucket,
            key: None,
            operation: S3Operation::GetBucketLocation,
        });
    }

    let Some(key) = key else {
        return Err(S3Error::no_such_key(bucket));
    };
    let operation = match *method {
        Method::PUT => S3Operation::PutObject,
        Method::HEAD => S3Operation::HeadObject,
        Method::DELETE => S3Operation::DeleteObject,
        _ => S3Operation::GetObject,
    };

    Ok(RoutingContext {
        bucket,
        key: Some(key),
        operation,
    })
}

/// Parse the URI path into an optional bucket and optional key.
///
/// Path format: `/{bucket}` or `/{bucket}/{key...}`
fn parse_path(path: &str) -> Result<(Option<String>, Option<String>), S3Error> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok((None, None));
    }

    if let Some((bucket, key_raw)) = trimmed.split_once('/') {
        let key = if key_raw.is_empty() {
            None
        } else {
            Some(decode_uri_component(key_raw)?)
        };
        Ok((Some(decode_uri_component(bucket)?), key))
    } else {
        Ok((Some(decode_uri_component(trimmed)?), None))
    }
}

/// Decode a percent-encoded URI component. Sequences that are not UTF-8 are
/// rejected rather than replaced, so distinct paths never share a key.
fn decode_uri_component(s: &str) -> Result<String, S3Error> {
    percent_decode_str(s)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| {
            S3Error::with_message(
                S3ErrorCode::InvalidArgument,
                "request path is not valid UTF-8 after percent-decoding",
            )
            .with_resource(s)
        })
}

fn query_has_key(query: Option<&str>, key: &str) -> bool {
    query
        .unwrap_or_default()
        .split('&')
        .any(|pair| pair.split_once('=').map_or(pair, |(k, _)| k) == key)
}
