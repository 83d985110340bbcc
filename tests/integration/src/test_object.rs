//! Object CRUD integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{s3_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_and_get_object() {
        let client = s3_client();
        let bucket = test_bucket_name("putget");

        let body = b"hello, bucketfs!";
        let put = client
            .put_object()
            .bucket(&bucket)
            .key("greeting.txt")
            .body(ByteStream::from_static(body))
            .content_type("text/plain")
            .send()
            .await
            .expect("put_object");
        assert!(put.e_tag().is_some(), "etag should be present");

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("greeting.txt")
            .send()
            .await
            .expect("get_object");

        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.content_length(), Some(16));
        assert_eq!(resp.e_tag(), put.e_tag());
        assert!(resp.last_modified().is_some());

        let data = resp
            .body
            .collect()
            .await
            .expect("collect body")
            .into_bytes();
        assert_eq!(data.as_ref(), body);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_head_object() {
        let client = s3_client();
        let bucket = test_bucket_name("head");

        client
            .put_object()
            .bucket(&bucket)
            .key("nested/dir/file.bin")
            .body(ByteStream::from_static(b"binary data"))
            .send()
            .await
            .expect("put_object");

        let resp = client
            .head_object()
            .bucket(&bucket)
            .key("nested/dir/file.bin")
            .send()
            .await
            .expect("head_object");

        assert_eq!(resp.content_length(), Some(11));
        assert_eq!(resp.content_type(), Some("application/octet-stream"));
        assert!(resp.e_tag().is_some());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_overwrite_object() {
        let client = s3_client();
        let bucket = test_bucket_name("overwrite");

        for body in [&b"first version"[..], &b"second"[..]] {
            client
                .put_object()
                .bucket(&bucket)
                .key("doc")
                .body(ByteStream::from(body.to_vec()))
                .send()
                .await
                .expect("put_object");
        }

        let data = client
            .get_object()
            .bucket(&bucket)
            .key("doc")
            .send()
            .await
            .expect("get_object")
            .body
            .collect()
            .await
            .expect("collect body")
            .into_bytes();
        assert_eq!(data.as_ref(), b"second");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_delete_object() {
        let client = s3_client();
        let bucket = test_bucket_name("delete");

        client
            .put_object()
            .bucket(&bucket)
            .key("doomed.txt")
            .body(ByteStream::from_static(b"bye"))
            .send()
            .await
            .expect("put_object");

        client
            .delete_object()
            .bucket(&bucket)
            .key("doomed.txt")
            .send()
            .await
            .expect("delete_object");

        let result = client
            .get_object()
            .bucket(&bucket)
            .key("doomed.txt")
            .send()
            .await;
        let err = result.expect_err("deleted object should be gone");
        assert!(
            err.into_service_error().is_no_such_key(),
            "expected NoSuchKey"
        );

        // Deleting again still succeeds.
        client
            .delete_object()
            .bucket(&bucket)
            .key("doomed.txt")
            .send()
            .await
            .expect("repeat delete_object");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_no_such_key_on_head() {
        let client = s3_client();
        let bucket = test_bucket_name("nokey");

        let result = client
            .head_object()
            .bucket(&bucket)
            .key("nonexistent.txt")
            .send()
            .await;

        assert!(result.is_err(), "head nonexistent key should fail");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_get_bucket_location() {
        let client = s3_client();
        let bucket = test_bucket_name("location");

        let resp = client
            .get_bucket_location()
            .bucket(&bucket)
            .send()
            .await
            .expect("get_bucket_location");
        assert!(resp.location_constraint().is_none_or(|c| c.as_str().is_empty()));
    }
}
