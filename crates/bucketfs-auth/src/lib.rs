//! AWS Signature Version 4 request authentication for bucketfs.
//!
//! This crate verifies header-signed SigV4 requests against a credential store
//! and authenticates `STREAMING-AWS4-HMAC-SHA256-PAYLOAD` bodies chunk by chunk,
//! without buffering more than one chunk of the payload.
//!
//! # Overview
//!
//! ```text
//! request headers -> SigV4Verifier::verify -> AuthResult (seed signature)
//!                                                |
//! raw body -----------------------------> ChunkedDecoder -> authenticated bytes
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bucketfs_auth::credentials::{Credential, CredentialStore, InMemoryCredentialStore};
//! use bucketfs_auth::sigv4::SigV4Verifier;
//!
//! let store = Arc::new(InMemoryCredentialStore::new());
//! store.put(Credential::new("AKIDEXAMPLE", "secret1234"));
//!
//! let verifier = SigV4Verifier::builder().store(store).build();
//! // verifier.verify(&parts) for each incoming request.
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request and string-to-sign construction
//! - [`chunked`] - Streaming payload decoder with rolling chunk signatures
//! - [`credentials`] - Credential store trait and concurrent in-memory store
//! - [`error`] - Authentication error types
//! - [`payload`] - Whole-payload SHA-256 verification
//! - [`sign`] - Client-side request and chunk signing
//! - [`signing_key`] - Signing key derivation and HMAC helpers
//! - [`sigv4`] - Header signature verification

pub mod canonical;
pub mod chunked;
pub mod credentials;
pub mod error;
pub mod payload;
pub mod sign;
pub mod signing_key;
pub mod sigv4;

pub use chunked::{ChunkSigningContext, ChunkedDecoder, ChunkedDecoderConfig};
pub use credentials::{Credential, CredentialStore, InMemoryCredentialStore};
pub use error::AuthError;
pub use sign::{ChunkSigner, RequestSigner};
pub use signing_key::{SigningKey, hash_payload};
pub use sigv4::{AuthResult, STREAMING_PAYLOAD, SigV4Verifier, UNSIGNED_PAYLOAD};
