//! Server configuration loaded from environment variables.

use std::fmt;
use std::time::Duration;

use bucketfs_auth::chunked::DEFAULT_MAX_CHUNK_SIZE;
use bucketfs_auth::sigv4::DEFAULT_MAX_CLOCK_SKEW;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// bucketfs server configuration.
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address (e.g. `"0.0.0.0:9000"`).
    #[builder(default = String::from("0.0.0.0:9000"))]
    pub listen: String,

    /// Directory holding one subdirectory per bucket.
    #[builder(default = String::from("./data"))]
    pub data_dir: String,

    /// Store objects as plain files with metadata under `.metadata`.
    #[builder(default = false)]
    pub direct_store: bool,

    /// Access key to secret key pairs. Authentication is enabled when non-empty.
    #[serde(skip)]
    #[builder(default)]
    pub credentials: Vec<(String, String)>,

    /// Accepted difference between request time and server time, in seconds.
    #[builder(default = DEFAULT_MAX_CLOCK_SKEW.as_secs())]
    pub max_clock_skew_secs: u64,

    /// Largest chunk accepted in a chunk-signed upload, in bytes.
    #[builder(default = DEFAULT_MAX_CHUNK_SIZE)]
    pub max_chunk_size: usize,

    /// Deadline in seconds for each body read of a chunk-signed upload.
    #[builder(default, setter(strip_option))]
    pub chunk_read_timeout_secs: Option<u64>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[builder(default = false)]
    pub log_json: bool,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access_keys: Vec<&str> = self.credentials.iter().map(|(ak, _)| ak.as_str()).collect();
        f.debug_struct("ServerConfig")
            .field("listen", &self.listen)
            .field("data_dir", &self.data_dir)
            .field("direct_store", &self.direct_store)
            .field("access_keys", &access_keys)
            .field("max_clock_skew_secs", &self.max_clock_skew_secs)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("chunk_read_timeout_secs", &self.chunk_read_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BUCKETFS_LISTEN` | `0.0.0.0:9000` |
    /// | `BUCKETFS_DATA_DIR` | `./data` |
    /// | `BUCKETFS_DIRECT_STORE` | `false` |
    /// | `BUCKETFS_CREDENTIALS` | *(empty)*, `ak:sk,ak2:sk2` |
    /// | `ACCESS_KEY` / `SECRET_KEY` | *(unset)*, also `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` |
    /// | `BUCKETFS_MAX_CLOCK_SKEW_SECS` | `900` |
    /// | `BUCKETFS_MAX_CHUNK_SIZE` | `16777216` |
    /// | `BUCKETFS_CHUNK_READ_TIMEOUT_SECS` | *(unset)*, no deadline |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` (`json` for JSON lines) |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(v) = lookup("BUCKETFS_LISTEN") {
            config.listen = v;
        }
        if let Some(v) = lookup("BUCKETFS_DATA_DIR") {
            config.data_dir = v;
        }
        if let Some(v) = lookup("BUCKETFS_DIRECT_STORE") {
            config.direct_store = parse_bool(&v);
        }
        if let Some(v) = lookup("BUCKETFS_CREDENTIALS") {
            config.credentials = parse_credentials(&v);
        }
        let access_key = lookup("ACCESS_KEY").or_else(|| lookup("AWS_ACCESS_KEY_ID"));
        let secret_key = lookup("SECRET_KEY").or_else(|| lookup("AWS_SECRET_ACCESS_KEY"));
        if let (Some(ak), Some(sk)) = (access_key, secret_key) {
            if !ak.is_empty() {
                config.credentials.push((ak, sk));
            }
        }
        if let Some(v) = lookup("BUCKETFS_MAX_CLOCK_SKEW_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                config.max_clock_skew_secs = n;
            }
        }
        if let Some(v) = lookup("BUCKETFS_MAX_CHUNK_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                config.max_chunk_size = n;
            }
        }
        if let Some(v) = lookup("BUCKETFS_CHUNK_READ_TIMEOUT_SECS") {
            config.chunk_read_timeout_secs = v.trim().parse::<u64>().ok().filter(|n| *n > 0);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            config.log_json = v.eq_ignore_ascii_case("json");
        }

        config
    }

    /// Whether requests must carry a valid signature.
    #[must_use]
    pub fn auth_enabled(&self) -> bool {
        !self.credentials.is_empty()
    }

    /// The verifier's clock skew tolerance.
    #[must_use]
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_secs)
    }

    /// The decoder's per-read deadline, if any.
    #[must_use]
    pub fn chunk_read_timeout(&self) -> Option<Duration> {
        self.chunk_read_timeout_secs.map(Duration::from_secs)
    }
}

/// Parse `ak:sk,ak2:sk2`. Entries without a `:` or with an empty access key are skipped.
fn parse_credentials(value: &str) -> Vec<(String, String)> {
    value
        .split(',')
        .filter_map(|entry| {
            let (ak, sk) = entry.trim().split_once(':')?;
            (!ak.is_empty()).then(|| (ak.to_owned(), sk.to_owned()))
        })
        .collect()
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
