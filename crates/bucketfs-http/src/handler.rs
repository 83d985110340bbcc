//! [`S3Handler`] backed by filesystem buckets.

use std::sync::Arc;

use bucketfs_store::{BucketProvider, ObjectMetadata};
use tracing::info;

use crate::auth::RequestBody;
use crate::body::S3ResponseBody;
use crate::dispatch::{HandlerFuture, S3Handler};
use crate::error::S3Error;
use crate::router::{RoutingContext, S3Operation};
use crate::xml::location_constraint_xml;

/// `Last-Modified` format (RFC 7231 IMF-fixdate).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Serves object operations from a [`BucketProvider`].
#[derive(Debug, Clone)]
pub struct FileBucketHandler {
    provider: Arc<BucketProvider>,
}

impl FileBucketHandler {
    /// Create a handler over `provider`.
    #[must_use]
    pub fn new(provider: Arc<BucketProvider>) -> Self {
        Self { provider }
    }

    /// The underlying bucket provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<BucketProvider> {
        &self.provider
    }
}

impl S3Handler for FileBucketHandler {
    fn handle_operation(
        &self,
        op: S3Operation,
        parts: http::request::Parts,
        body: RequestBody,
        ctx: RoutingContext,
    ) -> HandlerFuture {
        let provider = Arc::clone(&self.provider);
        Box::pin(async move {
            match op {
                S3Operation::PutObject => put_object(&provider, &parts, body, &ctx).await,
                S3Operation::GetObject => get_object(&provider, &ctx).await,
                S3Operation::HeadObject => head_object(&provider, &ctx).await,
                S3Operation::DeleteObject => delete_object(&provider, &ctx).await,
                S3Operation::GetBucketLocation => build_response(
                    http::Response::builder()
                        .status(http::StatusCode::OK)
                        .header(http::header::CONTENT_TYPE, "application/xml"),
                    S3ResponseBody::from_xml(location_constraint_xml()),
                ),
            }
        })
    }
}

async fn put_object(
    provider: &BucketProvider,
    parts: &http::request::Parts,
    body: RequestBody,
    ctx: &RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let content_type = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let bucket = provider.bucket(&ctx.bucket).await?;
    let metadata = bucket.put_object(ctx.key(), content_type, body).await?;
    info!(
        bucket = %ctx.bucket,
        key = ctx.key(),
        size = metadata.content_length,
        "object stored"
    );

    build_response(
        http::Response::builder()
            .status(http::StatusCode::OK)
            .header(http::header::ETAG, metadata.etag()),
        S3ResponseBody::empty(),
    )
}

async fn get_object(
    provider: &BucketProvider,
    ctx: &RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let Some(bucket) = provider.existing_bucket(&ctx.bucket).await? else {
        return Err(S3Error::no_such_key(ctx.resource()));
    };
    let Some(object) = bucket.get_object(ctx.key()).await? else {
        return Err(S3Error::no_such_key(ctx.resource()));
    };

    let length = object.metadata.content_length;
    let builder = object_headers(http::Response::builder(), &object.metadata);
    build_response(
        builder,
        S3ResponseBody::from_stream(object.into_stream(), Some(length)),
    )
}

async fn head_object(
    provider: &BucketProvider,
    ctx: &RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let Some(bucket) = provider.existing_bucket(&ctx.bucket).await? else {
        return Err(S3Error::no_such_key(ctx.resource()));
    };
    let Some(metadata) = bucket.get_metadata(ctx.key()).await? else {
        return Err(S3Error::no_such_key(ctx.resource()));
    };
    build_response(
        object_headers(http::Response::builder(), &metadata),
        S3ResponseBody::empty(),
    )
}

async fn delete_object(
    provider: &BucketProvider,
    ctx: &RoutingContext,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    if let Some(bucket) = provider.existing_bucket(&ctx.bucket).await? {
        bucket.delete_object(ctx.key()).await?;
    }
    build_response(
        http::Response::builder().status(http::StatusCode::NO_CONTENT),
        S3ResponseBody::empty(),
    )
}

fn object_headers(
    builder: http::response::Builder,
    metadata: &ObjectMetadata,
) -> http::response::Builder {
    let builder = builder
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, metadata.content_type.as_str())
        .header(http::header::CONTENT_LENGTH, metadata.content_length)
        .header(http::header::ETAG, metadata.etag());
    match metadata.last_modified() {
        Some(modified) => builder.header(
            http::header::LAST_MODIFIED,
            modified.format(HTTP_DATE_FORMAT).to_string(),
        ),
        None => builder,
    }
}

fn build_response(
    builder: http::response::Builder,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    builder
        .body(body)
        .map_err(|e| S3Error::internal_error(format!("failed to build response: {e}")))
}
