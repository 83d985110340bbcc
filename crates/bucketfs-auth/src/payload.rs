//! Verification of non-streamed payloads against `x-amz-content-sha256`.

use std::fmt;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::signing_key::signatures_match;

/// Whether `value` is a literal SHA-256 hex digest rather than a sentinel.
#[must_use]
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

struct HashState<S> {
    body: S,
    hasher: Option<Sha256>,
    expected: String,
}

/// Pass `body` through while hashing it, then fail if the digest differs
/// from `expected_hex`.
///
/// Bytes are released before the digest is known, so the consumer must not
/// commit anything until the stream has ended without error. The object store
/// only renames an upload into place after a clean end of stream.
pub fn verify_payload_sha256<S, E>(
    body: S,
    expected_hex: &str,
) -> impl Stream<Item = Result<Bytes, AuthError>> + use<S, E>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    let state = HashState {
        body,
        hasher: Some(Sha256::new()),
        expected: expected_hex.to_ascii_lowercase(),
    };

    futures::stream::unfold(state, |mut state| async move {
        let hasher = state.hasher.as_mut()?;
        match state.body.next().await {
            Some(Ok(bytes)) => {
                hasher.update(&bytes);
                Some((Ok(bytes), state))
            }
            Some(Err(err)) => {
                state.hasher = None;
                Some((Err(AuthError::BodyRead(err.to_string())), state))
            }
            None => {
                let actual = hex::encode(state.hasher.take()?.finalize());
                if signatures_match(&actual, &state.expected) {
                    None
                } else {
                    Some((Err(AuthError::PayloadHashMismatch), state))
                }
            }
        }
    })
}
