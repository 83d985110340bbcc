//! The S3 HTTP service implementing hyper's `Service` trait.
//!
//! [`S3HttpService`] ties together routing, authentication, body gating,
//! dispatch, and error rendering:
//!
//! 1. Health check interception (`GET /_health`, `GET /health`)
//! 2. Path-style routing
//! 3. SigV4 header verification, when a verifier is configured
//! 4. Body gating: chunk decoding or payload hashing
//! 5. Operation dispatch to the [`S3Handler`]
//! 6. Common response headers (`x-amz-request-id`, `x-amz-id-2`, `Server`)
//! 7. Error responses as S3 XML documents

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bucketfs_auth::{ChunkedDecoderConfig, SigV4Verifier};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{authenticate, gate_body};
use crate::body::S3ResponseBody;
use crate::dispatch::{S3Handler, dispatch_operation};
use crate::error::S3Error;
use crate::router::resolve;
use crate::xml::error_to_xml;

/// Value of the `Server` response header.
const SERVER_NAME: &str = "bucketfs";

/// Configuration for the S3 HTTP service.
#[derive(Clone, Default)]
pub struct S3HttpConfig {
    /// Signature verifier. `None` disables authentication.
    pub verifier: Option<Arc<SigV4Verifier>>,
    /// Limits for decoding chunk-signed bodies.
    pub decoder: ChunkedDecoderConfig,
}

impl fmt::Debug for S3HttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3HttpConfig")
            .field("auth_enabled", &self.verifier.is_some())
            .field("decoder", &self.decoder)
            .finish()
    }
}

/// The S3 HTTP service.
///
/// # Type Parameters
///
/// - `H`: The storage handler implementing [`S3Handler`].
#[derive(Debug)]
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    config: Arc<S3HttpConfig>,
}

impl<H: S3Handler> S3HttpService<H> {
    /// Create a new S3 HTTP service with the given handler and configuration.
    #[must_use]
    pub fn new(handler: H, config: S3HttpConfig) -> Self {
        Self::from_shared(Arc::new(handler), config)
    }

    /// Create a new S3 HTTP service from an `Arc<H>` handler and configuration.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, config: S3HttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &S3HttpConfig {
        &self.config
    }

    /// Run one request through the full pipeline.
    ///
    /// Generic over the body so that requests can be driven without a
    /// socket. The hyper [`Service`] impl delegates here.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<S3ResponseBody>
    where
        B: http_body::Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: fmt::Display + Send + 'static,
    {
        let request_id = Uuid::new_v4().to_string();
        let response = process_request(req, self.handler.as_ref(), &self.config, &request_id).await;
        add_common_headers(response, &request_id)
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

/// Process an incoming HTTP request through the S3 pipeline.
async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    config: &S3HttpConfig,
    request_id: &str,
) -> http::Response<S3ResponseBody>
where
    H: S3Handler,
    B: http_body::Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: fmt::Display + Send + 'static,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing S3 request");

    // 1. Health check interception.
    if is_health_check(&method, uri.path()) {
        return health_check_response();
    }

    // 2. Route the request.
    let ctx = match resolve(&method, &uri) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route S3 request");
            return error_to_response(&err, request_id);
        }
    };

    info!(
        operation = ctx.operation.as_str(),
        bucket = %ctx.bucket,
        key = ?ctx.key,
        request_id,
        "routed S3 request"
    );

    // 3. Authentication.
    let (parts, body) = req.into_parts();
    let auth = match authenticate(&parts, config.verifier.as_deref()) {
        Ok(auth) => auth,
        Err(err) => {
            warn!(error = %err, request_id, "authentication failed");
            return error_to_response(&err, request_id);
        }
    };

    // 4. Gate the body on the declared payload hash.
    let body = match gate_body(&parts, auth.as_ref(), body.into_data_stream(), &config.decoder) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, request_id, "rejected request body");
            return error_to_response(&err, request_id);
        }
    };

    // 5. Dispatch to handler.
    match dispatch_operation(handler, parts, body, ctx).await {
        Ok(response) => response,
        Err(err) => {
            if err.status_code.is_server_error() {
                warn!(error = %err, source = ?std::error::Error::source(&err), request_id, "S3 operation failed");
            } else {
                debug!(error = %err, request_id, "S3 operation returned error");
            }
            error_to_response(&err, request_id)
        }
    }
}

/// Render an error as an S3 XML error response.
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    let xml = error_to_xml(
        err.code.as_str(),
        &err.message,
        err.resource.as_deref(),
        request_id,
        request_id,
    );

    http::Response::builder()
        .status(err.status_code)
        .header(http::header::CONTENT_TYPE, "application/xml")
        .body(S3ResponseBody::from_xml(xml))
        .unwrap_or_else(|_| {
            http::Response::builder()
                .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(S3ResponseBody::empty())
                .expect("static response should be valid")
        })
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/_health" || path == "/health")
}

/// Produce a health check response.
fn health_check_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(S3ResponseBody::from_string(
            r#"{"status":"running","service":"s3"}"#,
        ))
        .expect("static health response should be valid")
}

/// Add common response headers to every S3 response.
fn add_common_headers(
    mut response: http::Response<S3ResponseBody>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv.clone());
        headers.insert("x-amz-id-2", hv);
    }
    headers.insert(
        http::header::SERVER,
        http::header::HeaderValue::from_static(SERVER_NAME),
    );

    response
}
