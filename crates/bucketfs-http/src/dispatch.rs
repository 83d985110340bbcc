//! The boundary between the HTTP layer and object storage.

use std::future::Future;
use std::pin::Pin;

use crate::auth::RequestBody;
use crate::body::S3ResponseBody;
use crate::error::S3Error;
use crate::router::{RoutingContext, S3Operation};

/// Future returned by [`S3Handler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>>;

/// Trait that the storage backend implements.
///
/// The handler receives a routed operation and a body that has already been
/// gated by authentication: every byte it yields is covered by the request
/// signature, and the stream fails rather than ends if verification breaks.
///
/// Boxed futures keep the trait usable behind `Arc<dyn S3Handler>`.
pub trait S3Handler: Send + Sync + 'static {
    /// Handle an S3 operation and produce an HTTP response.
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: RequestBody,
        ctx: RoutingContext,
    ) -> HandlerFuture;
}

/// Dispatch a routed request to the handler.
pub async fn dispatch_operation<H: S3Handler + ?Sized>(
    handler: &H,
    parts: http::request::Parts,
    body: RequestBody,
    ctx: RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let op = ctx.operation;
    tracing::debug!(operation = op.as_str(), bucket = %ctx.bucket, key = ?ctx.key, "dispatching S3 operation");
    handler.handle_operation(op, parts, body, ctx).await
}
