//! Authentication integration tests, including chunk-signed uploads.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use bucketfs_auth::{
        ChunkSigner, ChunkSigningContext, Credential, RequestSigner, STREAMING_PAYLOAD,
        UNSIGNED_PAYLOAD,
    };
    use bytes::Bytes;
    use chrono::Utc;

    use crate::{access_key, endpoint_url, s3_client, s3_client_with, secret_key, test_bucket_name};

    /// Sign a request to `path` and return its headers and the chunk context.
    fn sign(
        method: &str,
        path: &str,
        payload_hash: &str,
        extra: &[(&str, String)],
    ) -> (http::HeaderMap, ChunkSigningContext) {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(format!("{}{path}", endpoint_url()));
        for (name, value) in extra {
            builder = builder.header(*name, value.as_str());
        }
        let (mut parts, ()) = builder.body(()).expect("valid request").into_parts();
        let signer = RequestSigner::new(
            Credential::new(access_key(), secret_key()),
            "us-east-1",
            "s3",
        );
        let context = signer
            .sign(&mut parts, payload_hash, Utc::now())
            .expect("sign request");
        (parts.headers, context)
    }

    async fn put_streaming(path: &str, payload: &[u8], chunk_size: usize, tamper: bool) -> reqwest::Response {
        let (headers, context) = sign(
            "PUT",
            path,
            STREAMING_PAYLOAD,
            &[
                ("x-amz-decoded-content-length", payload.len().to_string()),
                ("content-encoding", "aws-chunked".to_owned()),
            ],
        );
        let mut body = ChunkSigner::encode_payload(&context, payload, chunk_size).to_vec();
        if tamper {
            let last_data = body.len() - 100;
            body[last_data] ^= 0x01;
        }

        reqwest::Client::new()
            .put(format!("{}{path}", endpoint_url()))
            .headers(headers)
            .body(Bytes::from(body))
            .send()
            .await
            .expect("send streaming upload")
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_bad_secret() {
        let client = s3_client_with(&access_key(), "definitely-not-the-secret");
        let bucket = test_bucket_name("badsecret");

        let result = client
            .put_object()
            .bucket(&bucket)
            .key("file.txt")
            .body(ByteStream::from_static(b"data"))
            .send()
            .await;
        let err = result.expect_err("bad secret should be rejected");
        assert_eq!(
            err.raw_response().map(|r| r.status().as_u16()),
            Some(403)
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unknown_access_key() {
        let client = s3_client_with("AKIDUNKNOWN", "whatever");
        let bucket = test_bucket_name("unknownkey");

        let result = client.get_object().bucket(&bucket).key("k").send().await;
        let err = result.expect_err("unknown key should be rejected");
        assert_eq!(
            err.raw_response().map(|r| r.status().as_u16()),
            Some(403)
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unsigned_request() {
        let bucket = test_bucket_name("anonymous");
        let resp = reqwest::Client::new()
            .get(format!("{}/{bucket}/key", endpoint_url()))
            .send()
            .await
            .expect("send request");
        assert_eq!(resp.status().as_u16(), 403);
        let text = resp.text().await.expect("read body");
        assert!(text.contains("<Code>AccessDenied</Code>"));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_store_chunk_signed_upload() {
        let bucket = test_bucket_name("streaming");
        let path = format!("/{bucket}/large.bin");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        let resp = put_streaming(&path, &payload, 64 * 1024, false).await;
        assert_eq!(resp.status().as_u16(), 200);
        assert!(resp.headers().contains_key("etag"));

        let data = s3_client()
            .get_object()
            .bucket(&bucket)
            .key("large.bin")
            .send()
            .await
            .expect("get_object")
            .body
            .collect()
            .await
            .expect("collect body")
            .into_bytes();
        assert_eq!(data.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_tampered_chunk_upload() {
        let bucket = test_bucket_name("tampered");
        let path = format!("/{bucket}/evil.bin");
        let payload = vec![b'a'; 70_000];

        let resp = put_streaming(&path, &payload, 64 * 1024, true).await;
        assert_eq!(resp.status().as_u16(), 403);
        let text = resp.text().await.expect("read body");
        assert!(text.contains("<Code>SignatureDoesNotMatch</Code>"));

        let (headers, _) = sign("HEAD", &path, UNSIGNED_PAYLOAD, &[]);
        let resp = reqwest::Client::new()
            .head(format!("{}{path}", endpoint_url()))
            .headers(headers)
            .send()
            .await
            .expect("send head");
        assert_eq!(resp.status().as_u16(), 404);
    }
}
