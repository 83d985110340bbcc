//! S3 HTTP routing, SigV4 request gating, and hyper service for bucketfs.
//!
//! - **Routing** ([`router`]): path-style `/{bucket}/{key}` addressing for
//!   object operations and `GET /{bucket}?location`.
//! - **Authentication** ([`auth`]): header signature checks and wrapping of
//!   the request body so handlers only see authenticated bytes.
//! - **Dispatch** ([`dispatch`]): the [`S3Handler`](dispatch::S3Handler) trait.
//! - **Handler** ([`handler`]): [`FileBucketHandler`](handler::FileBucketHandler),
//!   serving objects from filesystem buckets.
//! - **Service** ([`service`]): [`S3HttpService`](service::S3HttpService),
//!   the hyper `Service` tying the pieces together.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> S3HttpService (hyper Service)
//!     -> Health check interception
//!     -> router::resolve (method + path)
//!     -> SigV4 authentication (optional)
//!     -> Body gating (chunk decoder / payload hash)
//!     -> dispatch_operation (S3Handler trait)
//!     -> Common response headers (x-amz-request-id, Server)
//!   <- HTTP Response
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bucketfs_http::handler::FileBucketHandler;
//! use bucketfs_http::service::{S3HttpConfig, S3HttpService};
//! use bucketfs_store::{BucketProvider, StoreLayout};
//!
//! let provider = Arc::new(BucketProvider::new("./data", StoreLayout::Nested));
//! let service = S3HttpService::new(FileBucketHandler::new(provider), S3HttpConfig::default());
//! // Use `service` with hyper server.
//! ```

// S3Error carries an optional boxed source and is returned on every handler path.
#![allow(clippy::result_large_err)]

pub mod auth;
pub mod body;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod router;
pub mod service;
pub mod xml;

pub use body::S3ResponseBody;
pub use dispatch::S3Handler;
pub use error::{S3Error, S3ErrorCode};
pub use handler::FileBucketHandler;
pub use router::{RoutingContext, S3Operation};
pub use service::{S3HttpConfig, S3HttpService};
