//! Integration tests for the bucketfs server.
//!
//! These tests require a running server with authentication enabled, for
//! example:
//!
//! ```text
//! BUCKETFS_CREDENTIALS=test:test BUCKETFS_DATA_DIR=/tmp/bucketfs bucketfs-server
//! ```
//!
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//! Run them with:
//!
//! ```text
//! cargo test -p bucketfs-integration -- --ignored
//! ```

use std::sync::Once;

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{
    BehaviorVersion, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
#[must_use]
pub fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:9000".to_owned())
}

/// Access key configured on the server under test.
#[must_use]
pub fn access_key() -> String {
    std::env::var("BUCKETFS_TEST_ACCESS_KEY").unwrap_or_else(|_| "test".to_owned())
}

/// Secret key configured on the server under test.
#[must_use]
pub fn secret_key() -> String {
    std::env::var("BUCKETFS_TEST_SECRET_KEY").unwrap_or_else(|_| "test".to_owned())
}

/// Create an S3 client signing with the configured credentials.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    s3_client_with(&access_key(), &secret_key())
}

/// Create an S3 client signing with the given credentials.
#[must_use]
pub fn s3_client_with(access_key: &str, secret_key: &str) -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new(access_key, secret_key, None, None, "integration-test");

    // Flexible checksums would switch uploads to unsigned aws-chunked trailers.
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

mod test_auth;
mod test_object;
