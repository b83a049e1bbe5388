//! KMS-backed signing for the CloudSign workspace.
//!
//! This crate signs through an external key-management service whose
//! private keys never leave it, and verifies locally against the public
//! keys the service publishes.
//!
//! # Core Capabilities
//!
//! - **Key references**: parse `gcpkms://...` URIs into pinned or
//!   auto-discovering [`KeyReference`]s
//! - **Resolution**: find the active key version and build a local verifier
//!   for it, cached per signer with a fixed TTL
//! - **Remote signing**: CRC-32C protected `AsymmetricSign` calls
//! - **Verification**: local ECDSA P-256/P-384, RSA PKCS#1 v1.5 and RSA-PSS,
//!   with one rotation-aware retry for unpinned references
//! - **Provisioning**: idempotent create-if-absent of key rings and keys
//!
//! # Integration Points
//!
//! The remote service is reached through the [`KmsService`] trait. Enable
//! the `testutil` feature for [`testutil::InMemoryKms`], an in-process
//! implementation with real keys and fault injection.

pub mod algorithm;
pub mod cache;
pub mod context;
pub mod error;
pub mod integrity;
pub mod provision;
pub mod reference;
pub mod resolver;
pub mod service;
pub mod signer;
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use algorithm::{
    hash_for, to_native, HashFunction, NativeAlgorithm, SignatureScheme, DEFAULT_ALGORITHM,
    SUPPORTED_ALGORITHMS,
};
pub use cache::{ResolutionCache, DEFAULT_CACHE_TTL};
pub use context::CallContext;
pub use error::{KmsError, KmsResult};
pub use integrity::{crc32c, verify_crc32c};
pub use provision::KeyStatus;
pub use reference::{KeyReference, REFERENCE_FORMAT, REFERENCE_SCHEME};
pub use resolver::{KeyVersionResolver, ResolvedKeyVersion};
pub use service::{KmsService, ServiceError, ServiceResult, StatusCode};
pub use signer::KmsSigner;
pub use verifier::{decode_public_key_pem, LocalVerifier, PublicKey, VerifyError, VerifyOptions};
