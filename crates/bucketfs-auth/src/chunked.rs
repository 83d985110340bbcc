//! Decoder for `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` request bodies.
//!
//! A streamed upload is framed as a sequence of signed chunks:
//!
//! ```text
//! <hex-size>;chunk-signature=<sig>\r\n
//! <data>\r\n
//! ...
//! 0;chunk-signature=<sig>\r\n
//! \r\n
//! ```
//!
//! Each chunk signature is an HMAC over the previous signature and the chunk
//! data, so the chain starts at the seed signature computed for the request
//! headers and every chunk depends on all chunks before it. The decoder pulls
//! the raw body one frame at a time, holds at most one chunk in memory, and
//! releases a chunk's bytes only after its signature has been verified.
//!
//! Trailer header lines after the terminal chunk are consumed but are not
//! authenticated.

use std::fmt;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

use crate::error::AuthError;
use crate::signing_key::{EMPTY_PAYLOAD_SHA256, SigningKey, hash_payload, signatures_match};

/// Algorithm identifier at the head of every chunk string to sign.
pub const CHUNK_SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256-PAYLOAD";

/// Default ceiling on a single chunk's declared length (16 MiB).
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Chunk extension carrying the chunk signature.
pub const CHUNK_SIGNATURE_EXTENSION: &str = "chunk-signature=";

/// Longest accepted chunk header or trailer line, excluding the CRLF.
const MAX_LINE_LENGTH: usize = 4096;

/// Most trailer lines accepted after the terminal chunk.
const MAX_TRAILER_LINES: usize = 64;

/// Signing state carried from header verification into chunk verification.
#[derive(Debug, Clone)]
pub struct ChunkSigningContext {
    signing_key: SigningKey,
    timestamp: String,
    credential_scope: String,
    seed_signature: String,
}

impl ChunkSigningContext {
    /// Create a context from the derived key, the request timestamp
    /// (`YYYYMMDDTHHMMSSZ`), the credential scope, and the seed signature.
    pub fn new(
        signing_key: SigningKey,
        timestamp: impl Into<String>,
        credential_scope: impl Into<String>,
        seed_signature: impl Into<String>,
    ) -> Self {
        Self {
            signing_key,
            timestamp: timestamp.into(),
            credential_scope: credential_scope.into(),
            seed_signature: seed_signature.into(),
        }
    }

    /// The header signature that anchors the chain.
    #[must_use]
    pub fn seed_signature(&self) -> &str {
        &self.seed_signature
    }

    /// The request timestamp.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The credential scope.
    #[must_use]
    pub fn credential_scope(&self) -> &str {
        &self.credential_scope
    }

    /// Build the string to sign for a chunk following `previous_signature`.
    #[must_use]
    pub fn chunk_string_to_sign(&self, previous_signature: &str, data: &[u8]) -> String {
        format!(
            "{CHUNK_SIGNING_ALGORITHM}\n{}\n{}\n{previous_signature}\n{EMPTY_PAYLOAD_SHA256}\n{}",
            self.timestamp,
            self.credential_scope,
            hash_payload(data)
        )
    }

    /// Compute the hex signature of a chunk following `previous_signature`.
    #[must_use]
    pub fn chunk_signature(&self, previous_signature: &str, data: &[u8]) -> String {
        self.signing_key
            .sign(&self.chunk_string_to_sign(previous_signature, data))
    }
}

/// Limits applied while decoding a chunked body.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ChunkedDecoderConfig {
    /// Declared chunk lengths above this are rejected before reading the data.
    #[builder(default = DEFAULT_MAX_CHUNK_SIZE)]
    pub max_chunk_size: usize,
    /// Deadline for each read from the underlying body. `None` waits forever.
    #[builder(default, setter(strip_option))]
    pub read_timeout: Option<Duration>,
    /// Expected total of decoded bytes (`x-amz-decoded-content-length`).
    #[builder(default, setter(strip_option))]
    pub decoded_content_length: Option<u64>,
}

impl Default for ChunkedDecoderConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
enum DecoderState {
    Chunks,
    Finished,
    Failed(AuthError),
}

/// Pull-based decoder yielding authenticated chunk data.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use bucketfs_auth::{ChunkSigner, ChunkSigningContext, ChunkedDecoder, SigningKey};
///
/// # tokio_test::block_on(async {
/// let key = SigningKey::derive("secret", "20130524", "us-east-1", "s3");
/// let context = ChunkSigningContext::new(
///     key,
///     "20130524T000000Z",
///     "20130524/us-east-1/s3/aws4_request",
///     "seed",
/// );
/// let body = ChunkSigner::encode_payload(&context, b"hello world", 4);
///
/// let raw = futures::stream::iter(vec![Ok::<_, std::io::Error>(body)]);
/// let mut decoder = ChunkedDecoder::new(raw, context, Default::default());
///
/// let mut decoded = Vec::new();
/// while let Some(data) = decoder.next_chunk().await.unwrap() {
///     decoded.extend_from_slice(&data);
/// }
/// assert_eq!(decoded, b"hello world");
/// # });
/// ```
pub struct ChunkedDecoder<S> {
    body: S,
    body_done: bool,
    buffer: BytesMut,
    context: Option<ChunkSigningContext>,
    previous_signature: String,
    config: ChunkedDecoderConfig,
    decoded_len: u64,
    state: DecoderState,
}

impl<S> fmt::Debug for ChunkedDecoder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedDecoder")
            .field("verified", &self.context.is_some())
            .field("buffered", &self.buffer.len())
            .field("decoded_len", &self.decoded_len)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, E> ChunkedDecoder<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    /// Wrap `body`, verifying every chunk against the chain seeded by `context`.
    pub fn new(body: S, context: ChunkSigningContext, config: ChunkedDecoderConfig) -> Self {
        let previous_signature = context.seed_signature().to_owned();
        Self {
            body,
            body_done: false,
            buffer: BytesMut::new(),
            context: Some(context),
            previous_signature,
            config,
            decoded_len: 0,
            state: DecoderState::Chunks,
        }
    }

    /// Wrap `body` and strip the chunk framing without checking signatures.
    ///
    /// Used when request authentication is disabled. Framing, length limits,
    /// and the decoded length are still enforced; chunk signatures are optional.
    pub fn unverified(body: S, config: ChunkedDecoderConfig) -> Self {
        Self {
            body,
            body_done: false,
            buffer: BytesMut::new(),
            context: None,
            previous_signature: String::new(),
            config,
            decoded_len: 0,
            state: DecoderState::Chunks,
        }
    }

    /// Number of authenticated bytes released so far.
    #[must_use]
    pub fn decoded_len(&self) -> u64 {
        self.decoded_len
    }

    /// Whether the decoder has reached the end of the payload or failed.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        !matches!(self.state, DecoderState::Chunks)
    }

    /// Decode and verify the next chunk.
    ///
    /// Returns `Ok(None)` once the terminal chunk has been verified and the
    /// body fully consumed. After any error the decoder stays failed and
    /// returns the same error on every call.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, AuthError> {
        match &self.state {
            DecoderState::Finished => return Ok(None),
            DecoderState::Failed(err) => return Err(err.clone()),
            DecoderState::Chunks => {}
        }

        match self.decode_chunk().await {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => {
                self.state = DecoderState::Finished;
                self.buffer = BytesMut::new();
                Ok(None)
            }
            Err(err) => {
                debug!(error = %err, decoded_len = self.decoded_len, "chunked payload rejected");
                self.state = DecoderState::Failed(err.clone());
                self.buffer = BytesMut::new();
                Err(err)
            }
        }
    }

    /// Convert the decoder into a stream of authenticated byte spans.
    ///
    /// The stream ends after the payload completes or after yielding the first
    /// error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, AuthError>> {
        futures::stream::unfold(self, |mut decoder| async move {
            if decoder.is_terminated() {
                return None;
            }
            let item = decoder.next_chunk().await.transpose()?;
            Some((item, decoder))
        })
    }

    async fn decode_chunk(&mut self) -> Result<Option<Bytes>, AuthError> {
        let line = self.read_line().await?;
        let (size, signature) = parse_chunk_header(&line, self.config.max_chunk_size)?;
        let signature = signature.map(ToOwned::to_owned);

        if let Some(expected) = self.config.decoded_content_length {
            let total = self.decoded_len + size as u64;
            if total > expected {
                return Err(AuthError::DecodedLengthMismatch {
                    expected,
                    actual: total,
                });
            }
        }

        if size == 0 {
            self.verify_chunk(signature.as_deref(), &[])?;
            self.finish().await?;
            return Ok(None);
        }

        let data = self.read_exact(size).await?;
        self.expect_crlf().await?;
        self.verify_chunk(signature.as_deref(), &data)?;

        self.decoded_len += size as u64;
        trace!(size, decoded_len = self.decoded_len, "chunk verified");
        Ok(Some(data))
    }

    fn verify_chunk(&mut self, signature: Option<&str>, data: &[u8]) -> Result<(), AuthError> {
        let Some(context) = &self.context else {
            return Ok(());
        };
        let provided =
            signature.ok_or_else(|| AuthError::malformed_chunk("missing chunk signature"))?;

        let expected = context.chunk_signature(&self.previous_signature, data);
        if !signatures_match(&expected, provided) {
            return Err(AuthError::ChunkSignatureMismatch);
        }
        self.previous_signature = expected;
        Ok(())
    }

    /// Consume trailers after the terminal chunk and check the body is exhausted.
    async fn finish(&mut self) -> Result<(), AuthError> {
        let mut trailers = 0;
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                break;
            }
            trailers += 1;
            if trailers > MAX_TRAILER_LINES || !line.contains(&b':') {
                return Err(AuthError::malformed_chunk("invalid trailer"));
            }
            trace!(trailer = %String::from_utf8_lossy(&line), "ignoring unauthenticated trailer");
        }

        while !self.buffer.is_empty() || self.fill().await? {
            if !self.buffer.is_empty() {
                return Err(AuthError::malformed_chunk("data after final chunk"));
            }
        }

        if let Some(expected) = self.config.decoded_content_length {
            if expected != self.decoded_len {
                return Err(AuthError::DecodedLengthMismatch {
                    expected,
                    actual: self.decoded_len,
                });
            }
        }
        Ok(())
    }

    /// Pull one frame from the body into the buffer. Returns `false` at end of body.
    async fn fill(&mut self) -> Result<bool, AuthError> {
        if self.body_done {
            return Ok(false);
        }

        let next = match self.config.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.body.next())
                .await
                .map_err(|_| AuthError::BodyRead("timed out waiting for request body".to_owned()))?,
            None => self.body.next().await,
        };

        match next {
            Some(Ok(bytes)) => {
                self.buffer.extend_from_slice(&bytes);
                Ok(true)
            }
            Some(Err(err)) => Err(AuthError::BodyRead(err.to_string())),
            None => {
                self.body_done = true;
                Ok(false)
            }
        }
    }

    async fn read_line(&mut self) -> Result<Bytes, AuthError> {
        let mut searched = 0;
        loop {
            if let Some(pos) = find_crlf(&self.buffer, searched) {
                if pos > MAX_LINE_LENGTH {
                    return Err(AuthError::malformed_chunk("line too long"));
                }
                let line = self.buffer.split_to(pos).freeze();
                self.buffer.advance(2);
                return Ok(line);
            }
            if self.buffer.len() > MAX_LINE_LENGTH + 1 {
                return Err(AuthError::malformed_chunk("line too long"));
            }
            searched = self.buffer.len().saturating_sub(1);
            if !self.fill().await? {
                return Err(AuthError::TruncatedChunk);
            }
        }
    }

    async fn read_exact(&mut self, len: usize) -> Result<Bytes, AuthError> {
        while self.buffer.len() < len {
            if !self.fill().await? {
                return Err(AuthError::TruncatedChunk);
            }
        }
        Ok(self.buffer.split_to(len).freeze())
    }

    async fn expect_crlf(&mut self) -> Result<(), AuthError> {
        while self.buffer.len() < 2 {
            if !self.fill().await? {
                return Err(AuthError::TruncatedChunk);
            }
        }
        if &self.buffer[..2] != b"\r\n" {
            return Err(AuthError::malformed_chunk("missing CRLF after chunk data"));
        }
        self.buffer.advance(2);
        Ok(())
    }
}

/// Parse `<hex-size>[;chunk-signature=<sig>]` into the size and signature.
fn parse_chunk_header(line: &[u8], max_chunk_size: usize) -> Result<(usize, Option<&str>), AuthError> {
    let line = std::str::from_utf8(line)
        .map_err(|_| AuthError::malformed_chunk("header is not valid UTF-8"))?;

    let (size_hex, extension) = match line.split_once(';') {
        Some((size, ext)) => (size, Some(ext)),
        None => (line, None),
    };

    if size_hex.is_empty() || size_hex.len() > 16 || !size_hex.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(AuthError::malformed_chunk(format!(
            "invalid chunk size '{size_hex}'"
        )));
    }
    let size = usize::from_str_radix(size_hex, 16)
        .map_err(|_| AuthError::malformed_chunk(format!("invalid chunk size '{size_hex}'")))?;
    if size > max_chunk_size {
        return Err(AuthError::malformed_chunk(format!(
            "chunk size {size} exceeds limit {max_chunk_size}"
        )));
    }

    let signature = extension
        .map(|ext| {
            ext.strip_prefix(CHUNK_SIGNATURE_EXTENSION)
                .filter(|sig| !sig.is_empty() && sig.bytes().all(|b| b.is_ascii_hexdigit()))
                .ok_or_else(|| AuthError::malformed_chunk("invalid chunk signature"))
        })
        .transpose()?;

    Ok((size, signature))
}

/// Find the position of the next `\r\n` at or after `start`.
fn find_crlf(data: &[u8], start: usize) -> Option<usize> {
    if data.len() < start + 2 {
        return None;
    }
    data[start..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|p| start + p)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::sign::ChunkSigner;

    const TEST_SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY";
    const SEED_SIGNATURE: &str = "4f232c4386841ef735655705268965c44a0e4690baa4adea153f7db9fa80a0a9";
    const CHUNK1_SIGNATURE: &str =
        "ad80c730a21e5b8d04586a2213dd63b9a0e99e0e2307b0ade35a65485a288648";
    const CHUNK2_SIGNATURE: &str =
        "0055627c9e194cb4542bae2aa5492e3c1575bbb81b612b7d234b86a503ef5497";

    fn aws_context() -> ChunkSigningContext {
        ChunkSigningContext::new(
            SigningKey::derive(TEST_SECRET_KEY, "20130524", "us-east-1", "s3"),
            "20130524T000000Z",
            "20130524/us-east-1/s3/aws4_request",
            SEED_SIGNATURE,
        )
    }

    /// The AWS example body: 64 KiB and 1 KiB of `a`, then the terminal chunk.
    fn aws_example_body() -> Vec<u8> {
        let context = aws_context();
        let final_signature = context.chunk_signature(CHUNK2_SIGNATURE, b"");

        let mut body = Vec::new();
        body.extend_from_slice(format!("10000;chunk-signature={CHUNK1_SIGNATURE}\r\n").as_bytes());
        body.extend_from_slice(&[b'a'; 65536]);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("400;chunk-signature={CHUNK2_SIGNATURE}\r\n").as_bytes());
        body.extend_from_slice(&[b'a'; 1024]);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("0;chunk-signature={final_signature}\r\n\r\n").as_bytes());
        body
    }

    fn stream_of(
        body: &[u8],
        piece: usize,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin + use<> {
        let pieces: Vec<_> = body
            .chunks(piece)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(pieces)
    }

    async fn decode_all<S, E>(decoder: &mut ChunkedDecoder<S>) -> Result<Vec<u8>, AuthError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: fmt::Display,
    {
        let mut out = Vec::new();
        while let Some(data) = decoder.next_chunk().await? {
            out.extend_from_slice(&data);
        }
        Ok(out)
    }

    fn signed_body(chunks: &[&[u8]]) -> Vec<u8> {
        let mut signer = ChunkSigner::new(aws_context());
        let mut body = Vec::new();
        for chunk in chunks {
            body.extend_from_slice(&signer.encode_chunk(chunk));
        }
        body.extend_from_slice(&signer.encode_final());
        body
    }

    #[test]
    fn test_should_compute_aws_example_chunk_signatures() {
        let context = aws_context();
        let first = context.chunk_signature(SEED_SIGNATURE, &[b'a'; 65536]);
        assert_eq!(first, CHUNK1_SIGNATURE);
        let second = context.chunk_signature(&first, &[b'a'; 1024]);
        assert_eq!(second, CHUNK2_SIGNATURE);
    }

    #[test]
    fn test_should_build_chunk_string_to_sign() {
        let context = aws_context();
        let sts = context.chunk_string_to_sign(SEED_SIGNATURE, &[b'a'; 65536]);
        let expected = format!(
            "AWS4-HMAC-SHA256-PAYLOAD\n20130524T000000Z\n20130524/us-east-1/s3/aws4_request\n\
             {SEED_SIGNATURE}\n{EMPTY_PAYLOAD_SHA256}\n\
             bf718b6f653bebc184e1479f1935b8da974d701b893afcf49e701f3e2f9f9c5a"
        );
        assert_eq!(sts, expected);
    }

    #[tokio::test]
    async fn test_should_decode_aws_example_payload() {
        let body = aws_example_body();
        let config = ChunkedDecoderConfig::builder()
            .decoded_content_length(66560)
            .build();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, body.len()), aws_context(), config);

        let first = decoder.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.len(), 65536);
        let second = decoder.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.len(), 1024);
        assert!(decoder.next_chunk().await.unwrap().is_none());
        assert_eq!(decoder.decoded_len(), 66560);
        assert!(decoder.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_decode_when_frames_split_across_reads() {
        let body = aws_example_body();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 7), aws_context(), ChunkedDecoderConfig::default());

        let decoded = decode_all(&mut decoder).await.unwrap();
        assert_eq!(decoded.len(), 66560);
        assert!(decoded.iter().all(|&b| b == b'a'));
    }

    #[tokio::test]
    async fn test_should_accept_terminal_chunk_only() {
        let body = signed_body(&[]);
        let config = ChunkedDecoderConfig::builder()
            .decoded_content_length(0)
            .build();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 3), aws_context(), config);

        assert!(decoder.next_chunk().await.unwrap().is_none());
        assert!(decoder.is_terminated());
    }

    #[tokio::test]
    async fn test_should_reject_terminal_chunk_with_wrong_signature() {
        let body = format!("0;chunk-signature={CHUNK1_SIGNATURE}\r\n\r\n");
        let mut decoder =
            ChunkedDecoder::new(stream_of(body.as_bytes(), 64), aws_context(), ChunkedDecoderConfig::default());

        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::ChunkSignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_should_reject_reordered_chunks() {
        let mut signer = ChunkSigner::new(aws_context());
        let first = signer.encode_chunk(b"hello ");
        let second = signer.encode_chunk(b"world!");
        let last = signer.encode_final();

        let mut body = Vec::new();
        body.extend_from_slice(&second);
        body.extend_from_slice(&first);
        body.extend_from_slice(&last);

        let mut decoder = ChunkedDecoder::new(stream_of(&body, 16), aws_context(), ChunkedDecoderConfig::default());
        assert_eq!(
            decode_all(&mut decoder).await.unwrap_err(),
            AuthError::ChunkSignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_should_reject_swapped_data_with_original_signatures() {
        let context = aws_context();
        let sig_a = context.chunk_signature(SEED_SIGNATURE, b"aaaa");
        let sig_b = context.chunk_signature(&sig_a, b"bbbb");
        let sig_final = context.chunk_signature(&sig_b, b"");

        let body = format!(
            "4;chunk-signature={sig_a}\r\nbbbb\r\n\
             4;chunk-signature={sig_b}\r\naaaa\r\n\
             0;chunk-signature={sig_final}\r\n\r\n"
        );
        let mut decoder =
            ChunkedDecoder::new(stream_of(body.as_bytes(), 64), context, ChunkedDecoderConfig::default());

        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::ChunkSignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_should_reject_dropped_middle_chunk() {
        let mut signer = ChunkSigner::new(aws_context());
        let first = signer.encode_chunk(b"one");
        let _ = signer.encode_chunk(b"two");
        let third = signer.encode_chunk(b"three");
        let last = signer.encode_final();

        let body = [first, third, last].concat();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 64), aws_context(), ChunkedDecoderConfig::default());

        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), &b"one"[..]);
        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::ChunkSignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_should_reject_truncated_chunk_data() {
        let body = signed_body(&[b"hello world"]);
        let cut = body.iter().position(|&b| b == b'w').unwrap();
        let mut decoder =
            ChunkedDecoder::new(stream_of(&body[..cut], 4), aws_context(), ChunkedDecoderConfig::default());

        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::TruncatedChunk
        );
    }

    #[tokio::test]
    async fn test_should_reject_missing_terminal_chunk() {
        let mut signer = ChunkSigner::new(aws_context());
        let body = signer.encode_chunk(b"hello");
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 64), aws_context(), ChunkedDecoderConfig::default());

        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), &b"hello"[..]);
        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::TruncatedChunk
        );
    }

    #[tokio::test]
    async fn test_should_reject_malformed_chunk_headers() {
        for header in [
            "zz;chunk-signature=abcd\r\n",
            ";chunk-signature=abcd\r\n",
            "5;signature=abcd\r\n",
            "5;chunk-signature=\r\n",
            "5;chunk-signature=not-hex!\r\n",
            "11111111111111111;chunk-signature=abcd\r\n",
        ] {
            let mut decoder = ChunkedDecoder::new(
                stream_of(header.as_bytes(), 64),
                aws_context(),
                ChunkedDecoderConfig::default(),
            );
            assert!(
                matches!(
                    decoder.next_chunk().await,
                    Err(AuthError::MalformedChunkHeader(_))
                ),
                "{header:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_should_require_signature_when_verifying() {
        let body = b"5\r\nhello\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new(stream_of(body, 64), aws_context(), ChunkedDecoderConfig::default());

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::MalformedChunkHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_should_reject_chunk_larger_than_limit_before_reading_data() {
        let body = b"1000;chunk-signature=abcd\r\n";
        let config = ChunkedDecoderConfig::builder().max_chunk_size(1024).build();
        let mut decoder = ChunkedDecoder::new(stream_of(body, 64), aws_context(), config);

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::MalformedChunkHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_should_reject_overlong_header_line() {
        let body = vec![b'1'; MAX_LINE_LENGTH * 2];
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 512), aws_context(), ChunkedDecoderConfig::default());

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::MalformedChunkHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_should_reject_missing_crlf_after_data() {
        let context = aws_context();
        let signature = context.chunk_signature(SEED_SIGNATURE, b"hello");
        let body = format!("5;chunk-signature={signature}\r\nhelloXX");
        let mut decoder =
            ChunkedDecoder::new(stream_of(body.as_bytes(), 64), context, ChunkedDecoderConfig::default());

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::MalformedChunkHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_should_reject_data_after_final_chunk() {
        let mut body = signed_body(&[b"hello"]);
        body.extend_from_slice(b"extra");
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 64), aws_context(), ChunkedDecoderConfig::default());

        assert!(matches!(
            decode_all(&mut decoder).await,
            Err(AuthError::MalformedChunkHeader(_))
        ));
    }

    #[tokio::test]
    async fn test_should_skip_trailer_headers() {
        let mut signer = ChunkSigner::new(aws_context());
        let mut body = signer.encode_chunk(b"hello").to_vec();
        let final_chunk = signer.encode_final();
        // Replace the closing empty line with a trailer block.
        body.extend_from_slice(&final_chunk[..final_chunk.len() - 2]);
        body.extend_from_slice(b"x-amz-checksum-crc32:sOO8/Q==\r\n\r\n");

        let mut decoder = ChunkedDecoder::new(stream_of(&body, 5), aws_context(), ChunkedDecoderConfig::default());
        assert_eq!(decode_all(&mut decoder).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_should_reject_decoded_length_overflow_before_releasing_bytes() {
        let body = signed_body(&[b"hello", b"world"]);
        let config = ChunkedDecoderConfig::builder()
            .decoded_content_length(7)
            .build();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 64), aws_context(), config);

        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), &b"hello"[..]);
        assert_eq!(
            decoder.next_chunk().await.unwrap_err(),
            AuthError::DecodedLengthMismatch {
                expected: 7,
                actual: 10
            }
        );
    }

    #[tokio::test]
    async fn test_should_reject_short_decoded_length() {
        let body = signed_body(&[b"hello"]);
        let config = ChunkedDecoderConfig::builder()
            .decoded_content_length(10)
            .build();
        let mut decoder = ChunkedDecoder::new(stream_of(&body, 64), aws_context(), config);

        assert_eq!(
            decode_all(&mut decoder).await.unwrap_err(),
            AuthError::DecodedLengthMismatch {
                expected: 10,
                actual: 5
            }
        );
    }

    #[tokio::test]
    async fn test_should_stay_failed_after_error() {
        let body = format!("0;chunk-signature={CHUNK1_SIGNATURE}\r\n\r\n");
        let mut decoder =
            ChunkedDecoder::new(stream_of(body.as_bytes(), 64), aws_context(), ChunkedDecoderConfig::default());

        let first = decoder.next_chunk().await.unwrap_err();
        let second = decoder.next_chunk().await.unwrap_err();
        assert_eq!(first, second);
        assert!(decoder.is_terminated());
    }

    #[tokio::test]
    async fn test_should_end_stream_after_first_error() {
        let context = aws_context();
        let good = context.chunk_signature(SEED_SIGNATURE, b"ok");
        let body = format!("2;chunk-signature={good}\r\nok\r\n3;chunk-signature={good}\r\nbad\r\n");
        let decoder =
            ChunkedDecoder::new(stream_of(body.as_bytes(), 64), context, ChunkedDecoderConfig::default());

        let items: Vec<_> = decoder.into_stream().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &Bytes::from_static(b"ok"));
        assert_eq!(
            items[1].as_ref().unwrap_err(),
            &AuthError::ChunkSignatureMismatch
        );
    }

    #[tokio::test]
    async fn test_should_report_body_errors() {
        let raw = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"5;chunk")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let mut decoder = ChunkedDecoder::new(raw, aws_context(), ChunkedDecoderConfig::default());

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::BodyRead(msg)) if msg.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_should_time_out_stalled_body() {
        let raw = futures::stream::pending::<Result<Bytes, Infallible>>();
        let config = ChunkedDecoderConfig::builder()
            .read_timeout(Duration::from_millis(10))
            .build();
        let mut decoder = ChunkedDecoder::new(raw, aws_context(), config);

        assert!(matches!(
            decoder.next_chunk().await,
            Err(AuthError::BodyRead(_))
        ));
    }

    #[tokio::test]
    async fn test_should_strip_framing_without_verification() {
        let body = b"5;chunk-signature=abc123\r\nhello\r\n6\r\n world\r\n0;chunk-signature=def456\r\n\r\n";
        let mut decoder = ChunkedDecoder::unverified(stream_of(body, 9), ChunkedDecoderConfig::default());

        assert_eq!(decode_all(&mut decoder).await.unwrap(), b"hello world");
    }

    #[test]
    fn test_should_not_print_signing_key_in_debug_output() {
        let debug = format!("{:?}", aws_context());
        assert!(debug.contains("[REDACTED]"));
    }
}
