//! S3 error codes and the error type returned by every handler.
//!
//! Authentication and storage failures are folded into [`S3Error`] here so
//! the service renders a single kind of error document.

use std::fmt;

use bucketfs_auth::AuthError;
use bucketfs_store::StoreError;

/// The S3 error codes this server can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// AccessDenied error.
    AccessDenied,
    /// AuthorizationHeaderMalformed error.
    AuthorizationHeaderMalformed,
    /// IncompleteBody error.
    IncompleteBody,
    /// InternalError error.
    #[default]
    InternalError,
    /// InvalidAccessKeyId error.
    InvalidAccessKeyId,
    /// InvalidArgument error.
    InvalidArgument,
    /// InvalidBucketName error.
    InvalidBucketName,
    /// InvalidRequest error.
    InvalidRequest,
    /// MethodNotAllowed error.
    MethodNotAllowed,
    /// MissingContentLength error.
    MissingContentLength,
    /// NoSuchKey error.
    NoSuchKey,
    /// RequestTimeTooSkewed error.
    RequestTimeTooSkewed,
    /// RequestTimeout error.
    RequestTimeout,
    /// SignatureDoesNotMatch error.
    SignatureDoesNotMatch,
    /// XAmzContentSHA256Mismatch error.
    XAmzContentSHA256Mismatch,
}

impl S3ErrorCode {
    /// Returns the error code as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::AuthorizationHeaderMalformed => "AuthorizationHeaderMalformed",
            Self::IncompleteBody => "IncompleteBody",
            Self::InternalError => "InternalError",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidRequest => "InvalidRequest",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::NoSuchKey => "NoSuchKey",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::RequestTimeout => "RequestTimeout",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::XAmzContentSHA256Mismatch => "XAmzContentSHA256Mismatch",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::AuthorizationHeaderMalformed
            | Self::IncompleteBody
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidRequest
            | Self::MissingContentLength
            | Self::RequestTimeout
            | Self::XAmzContentSHA256Mismatch => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied
            | Self::InvalidAccessKeyId
            | Self::RequestTimeTooSkewed
            | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchKey => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the default message for this error.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::AuthorizationHeaderMalformed => "The authorization header is malformed",
            Self::IncompleteBody => {
                "You did not provide the number of bytes specified by the Content-Length HTTP header"
            }
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidAccessKeyId => {
                "The AWS access key Id you provided does not exist in our records"
            }
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::MissingContentLength => "You must provide the Content-Length HTTP header",
            Self::NoSuchKey => "The specified key does not exist",
            Self::RequestTimeTooSkewed => {
                "The difference between the request time and the server's time is too large"
            }
            Self::RequestTimeout => {
                "Your socket connection to the server was not read from or written to within the timeout period"
            }
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::XAmzContentSHA256Mismatch => {
                "The provided 'x-amz-content-sha256' header does not match what was computed"
            }
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 error response.
#[derive(Debug)]
pub struct S3Error {
    /// The error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error.
    pub resource: Option<String>,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S3Error({}): {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create a new S3Error from an error code.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Create a new S3Error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            resource: None,
            source: None,
        }
    }

    /// Set the resource that caused this error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Create a NoSuchKey error.
    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    /// Create a MethodNotAllowed error.
    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::MethodNotAllowed).with_resource(method)
    }

    /// Create a MissingContentLength error.
    #[must_use]
    pub fn missing_content_length(header: &str) -> Self {
        Self::with_message(
            S3ErrorCode::MissingContentLength,
            format!("You must provide the {header} HTTP header"),
        )
    }

    /// Create an InternalError error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }
}

impl From<AuthError> for S3Error {
    fn from(err: AuthError) -> Self {
        let code = match &err {
            AuthError::MissingAuth => S3ErrorCode::AccessDenied,
            AuthError::MalformedAuthHeader(_) => S3ErrorCode::AuthorizationHeaderMalformed,
            AuthError::InvalidPath(_) | AuthError::MalformedChunkHeader(_) => {
                S3ErrorCode::InvalidRequest
            }
            AuthError::UnknownAccessKey(_) => S3ErrorCode::InvalidAccessKeyId,
            AuthError::ClockSkew => S3ErrorCode::RequestTimeTooSkewed,
            AuthError::SignatureMismatch | AuthError::ChunkSignatureMismatch => {
                S3ErrorCode::SignatureDoesNotMatch
            }
            AuthError::TruncatedChunk | AuthError::DecodedLengthMismatch { .. } => {
                S3ErrorCode::IncompleteBody
            }
            AuthError::PayloadHashMismatch => S3ErrorCode::XAmzContentSHA256Mismatch,
            AuthError::BodyRead(_) => S3ErrorCode::RequestTimeout,
        };
        Self::with_message(code, err.to_string()).with_source(err)
    }
}

impl From<StoreError> for S3Error {
    fn from(err: StoreError) -> Self {
        if let Some(auth) = err
            .body_error()
            .and_then(|source| source.downcast_ref::<AuthError>())
        {
            return auth.clone().into();
        }
        let message = err.to_string();
        match err {
            StoreError::InvalidKey(_) => Self::with_message(S3ErrorCode::InvalidArgument, message),
            StoreError::InvalidBucketName(name) => {
                Self::new(S3ErrorCode::InvalidBucketName).with_resource(name)
            }
            StoreError::Body(_) => Self::with_message(S3ErrorCode::IncompleteBody, message),
            other @ (StoreError::Io(_) | StoreError::Metadata(_)) => {
                Self::new(S3ErrorCode::InternalError).with_source(other)
            }
        }
    }
}
