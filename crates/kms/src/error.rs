//! Error types for KMS signing operations.
//!
//! Every variant names the phase that failed (reference parsing, resolution,
//! signing, verification, integrity) and keeps the underlying service error
//! as its source instead of discarding it.

use thiserror::Error;

use crate::reference::REFERENCE_FORMAT;
use crate::service::{ServiceError, StatusCode};

/// Errors returned by the KMS signer and its components.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KmsError {
    /// Reference string does not match the key reference grammar.
    #[error("malformed key reference {reference:?}: expected {}", REFERENCE_FORMAT)]
    MalformedReference { reference: String },

    /// Algorithm name or native algorithm outside the supported set.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key exists but its purpose is not asymmetric signing.
    #[error("resolve: key {key} cannot be used to sign (purpose {purpose})")]
    NotASigningKey { key: String, purpose: String },

    /// No enabled version could be selected for the key.
    #[error("resolve: no enabled key version found for {key}")]
    NoEnabledVersion { key: String },

    /// Public key material for a version could not be fetched.
    #[error("resolve: unable to fetch public key for {version}: {source}")]
    PublicKeyFetchFailed {
        version: String,
        #[source]
        source: ServiceError,
    },

    /// Public key PEM could not be decoded or does not fit the algorithm.
    #[error("resolve: invalid public key PEM: {0}")]
    InvalidPem(String),

    /// The asymmetric sign call itself failed.
    #[error("sign: AsymmetricSign with {version} failed: {source}")]
    RemoteSignFailed {
        version: String,
        #[source]
        source: ServiceError,
    },

    /// The service could not verify the digest checksum sent with the request.
    #[error("integrity: AsymmetricSign request for {version} corrupted in-transit")]
    RequestCorrupted { version: String },

    /// A checksum recomputed over response bytes did not match the service's claim.
    #[error("integrity: {operation} response corrupted in-transit (expected crc32c {expected:?}, computed {actual:#010x})")]
    ResponseCorrupted {
        operation: &'static str,
        expected: Option<u32>,
        actual: u32,
    },

    /// The signature came back attributed to a different key version.
    #[error("integrity: AsymmetricSign for {requested} answered by {actual}")]
    WrongSigningVersion { requested: String, actual: String },

    /// Hash function cannot be used for this signing request.
    #[error("sign: unsupported hash function: {0}")]
    UnsupportedHash(String),

    /// Digest length does not match its hash function.
    #[error("sign: digest is {actual} bytes, {hash} requires {expected}")]
    InvalidDigest {
        hash: String,
        expected: usize,
        actual: usize,
    },

    /// Local signature verification failed.
    #[error("verify: signature verification failed for {version}: {reason}")]
    VerificationFailed { version: String, reason: String },

    /// The caller canceled the operation.
    #[error("{operation}: operation canceled")]
    Canceled { operation: &'static str },

    /// The caller's deadline passed before the operation completed.
    #[error("{operation}: deadline exceeded")]
    DeadlineExceeded { operation: &'static str },

    /// Any other remote failure.
    #[error("{operation}: KMS service error: {source}")]
    TransientService {
        operation: &'static str,
        #[source]
        source: ServiceError,
    },

    /// Client configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] cloudsign_core::CoreError),
}

impl KmsError {
    pub(crate) fn malformed_reference(reference: &str) -> Self {
        Self::MalformedReference {
            reference: reference.to_string(),
        }
    }

    /// Wraps a service error raised by `operation`, mapping the transport's
    /// cancellation codes onto the caller-facing cancellation kinds.
    pub fn service(operation: &'static str, source: ServiceError) -> Self {
        match source.code {
            StatusCode::Cancelled => Self::Canceled { operation },
            StatusCode::DeadlineExceeded => Self::DeadlineExceeded { operation },
            _ => Self::TransientService { operation, source },
        }
    }

    /// True for cancellation and deadline failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled { .. } | Self::DeadlineExceeded { .. })
    }

    /// True for in-transit corruption failures, which are never retried.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::RequestCorrupted { .. }
                | Self::ResponseCorrupted { .. }
                | Self::WrongSigningVersion { .. }
        )
    }
}

/// Result type for KMS operations.
pub type KmsResult<T> = Result<T, KmsError>;
