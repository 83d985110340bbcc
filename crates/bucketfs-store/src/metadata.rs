//! Object metadata persisted next to each object's content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type recorded when the client did not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata document stored as JSON for every object.
///
/// ```json
/// {"digest":"5d41402abc4b2a76b9719d911017c592","content_length":5,
///  "content_type":"text/plain","mod_time":1369353600000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Hex MD5 of the content.
    pub digest: String,
    /// Content size in bytes.
    pub content_length: u64,
    /// MIME type given at upload.
    pub content_type: String,
    /// Last modification time in Unix milliseconds.
    pub mod_time: i64,
}

impl ObjectMetadata {
    /// The quoted ETag value for this object.
    #[must_use]
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.digest)
    }

    /// The modification time, if it is representable.
    #[must_use]
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.mod_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_snake_case_json_fields() {
        let metadata = ObjectMetadata {
            digest: "5d41402abc4b2a76b9719d911017c592".to_owned(),
            content_length: 5,
            content_type: "text/plain".to_owned(),
            mod_time: 1_369_353_600_000,
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["digest"], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(json["content_length"], 5);
        assert_eq!(json["content_type"], "text/plain");
        assert_eq!(json["mod_time"], 1_369_353_600_000_i64);
    }

    #[test]
    fn test_should_quote_etag() {
        let metadata = ObjectMetadata {
            digest: "abc".to_owned(),
            content_length: 0,
            content_type: DEFAULT_CONTENT_TYPE.to_owned(),
            mod_time: 0,
        };
        assert_eq!(metadata.etag(), "\"abc\"");
        assert_eq!(
            metadata.last_modified().unwrap().to_rfc3339(),
            "1970-01-01T00:00:00+00:00"
        );
    }
}
