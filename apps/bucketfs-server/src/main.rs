//! bucketfs server - S3-compatible object storage on the local filesystem.
//!
//! Serves `PUT`/`GET`/`HEAD`/`DELETE` on path-style `/{bucket}/{key}` URLs,
//! storing each bucket as a directory under the data directory. When
//! credentials are configured every request must carry a valid AWS
//! Signature Version 4, including chunk-signed streaming uploads.
//!
//! # Usage
//!
//! ```text
//! BUCKETFS_DATA_DIR=/srv/objects BUCKETFS_CREDENTIALS=AKID:secret bucketfs-server
//! ```
//!
//! See [`config::ServerConfig::from_env`] for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bucketfs_auth::{ChunkedDecoderConfig, InMemoryCredentialStore, SigV4Verifier};
use bucketfs_http::dispatch::S3Handler;
use bucketfs_http::handler::FileBucketHandler;
use bucketfs_http::service::{S3HttpConfig, S3HttpService};
use bucketfs_store::{BucketProvider, StoreLayout};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Build the [`S3HttpConfig`] from the server configuration.
///
/// Authentication is enabled only when at least one credential is configured.
fn build_http_config(config: &ServerConfig) -> S3HttpConfig {
    let verifier = config.auth_enabled().then(|| {
        let store = InMemoryCredentialStore::from_pairs(config.credentials.iter().cloned());
        info!(credentials = store.len(), "SigV4 authentication enabled");
        Arc::new(
            SigV4Verifier::builder()
                .store(Arc::new(store))
                .max_clock_skew(config.max_clock_skew())
                .build(),
        )
    });
    if verifier.is_none() {
        warn!("no credentials configured, requests are not authenticated");
    }

    let mut decoder = ChunkedDecoderConfig::builder()
        .max_chunk_size(config.max_chunk_size)
        .build();
    decoder.read_timeout = config.chunk_read_timeout();

    S3HttpConfig { verifier, decoder }
}

fn store_layout(config: &ServerConfig) -> StoreLayout {
    if config.direct_store {
        StoreLayout::Direct
    } else {
        StoreLayout::Nested
    }
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: S3Handler>(listener: TcpListener, service: S3HttpService<H>) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Request the health endpoint of a running server.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /_health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();

    // Exit status for container health probes.
    if std::env::args().any(|a| a == "--health-check") {
        let addr = config.listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&config.log_level, config.log_json)?;

    info!(
        listen = %config.listen,
        data_dir = %config.data_dir,
        direct_store = config.direct_store,
        auth_enabled = config.auth_enabled(),
        version = VERSION,
        "starting bucketfs server",
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("failed to create data directory {}", config.data_dir))?;

    let provider = Arc::new(BucketProvider::new(&config.data_dir, store_layout(&config)));
    let handler = FileBucketHandler::new(provider);
    let service = S3HttpService::new(handler, build_http_config(&config));

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
