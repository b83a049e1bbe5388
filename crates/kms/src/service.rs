//! Remote KMS capability.
//!
//! [`KmsService`] abstracts the RPC surface the signer needs, so the
//! resolver and signer can run against a live transport in production and an
//! in-memory substitute in tests. Request and response types mirror the
//! service's resource model; field names follow its wire names.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::algorithm::NativeAlgorithm;
use crate::context::CallContext;

/// Filter selecting enabled versions in a list call.
pub const ENABLED_VERSIONS_FILTER: &str = "state=ENABLED";

/// Ordering that puts the greatest version name first.
pub const NAME_DESC_ORDER: &str = "name desc";

/// Status codes reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    ResourceExhausted,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::Unauthenticated => "Unauthenticated",
        };
        f.write_str(name)
    }
}

/// Error returned by a [`KmsService`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub code: StatusCode,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unavailable, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == StatusCode::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.code == StatusCode::AlreadyExists
    }
}

/// Result of a [`KmsService`] call.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// What a key may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoKeyPurpose {
    Unspecified,
    EncryptDecrypt,
    AsymmetricSign,
    AsymmetricDecrypt,
    Mac,
}

impl fmt::Display for CryptoKeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "CRYPTO_KEY_PURPOSE_UNSPECIFIED",
            Self::EncryptDecrypt => "ENCRYPT_DECRYPT",
            Self::AsymmetricSign => "ASYMMETRIC_SIGN",
            Self::AsymmetricDecrypt => "ASYMMETRIC_DECRYPT",
            Self::Mac => "MAC",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a key version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoKeyVersionState {
    PendingGeneration,
    Enabled,
    Disabled,
    DestroyScheduled,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoKey {
    pub name: String,
    pub purpose: CryptoKeyPurpose,
    /// Algorithm used for newly created versions.
    pub version_algorithm: NativeAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoKeyVersion {
    /// Full resource name, `.../cryptoKeys/<K>/cryptoKeyVersions/<V>`.
    pub name: String,
    pub state: CryptoKeyVersionState,
    pub algorithm: NativeAlgorithm,
}

impl CryptoKeyVersion {
    pub fn is_enabled(&self) -> bool {
        self.state == CryptoKeyVersionState::Enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCryptoKeyVersionsRequest {
    pub parent: String,
    pub filter: String,
    pub order_by: String,
}

impl ListCryptoKeyVersionsRequest {
    /// Enabled versions of `parent`, greatest name first.
    pub fn enabled_newest_first(parent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            filter: ENABLED_VERSIONS_FILTER.to_string(),
            order_by: NAME_DESC_ORDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyResponse {
    /// Version the key belongs to.
    pub name: String,
    pub pem: String,
    pub algorithm: NativeAlgorithm,
    /// CRC-32C of `pem`, when the service supplies it.
    pub pem_crc32c: Option<u32>,
}

/// Digest to sign, tagged with the hash that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Digest {
    Sha256(Vec<u8>),
    Sha384(Vec<u8>),
    Sha512(Vec<u8>),
}

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha256(d) | Self::Sha384(d) | Self::Sha512(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricSignRequest {
    /// Version resource name.
    pub name: String,
    pub digest: Digest,
    /// CRC-32C of the digest bytes; `None` when the caller supplied none.
    pub digest_crc32c: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsymmetricSignResponse {
    pub signature: Vec<u8>,
    pub signature_crc32c: Option<u32>,
    /// True when the service checked `digest_crc32c` and it matched.
    pub verified_digest_crc32c: bool,
    /// Version that produced the signature.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCryptoKeyRequest {
    /// Key ring resource name.
    pub parent: String,
    pub crypto_key_id: String,
    pub purpose: CryptoKeyPurpose,
    pub algorithm: NativeAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateKeyRingRequest {
    /// Location resource name.
    pub parent: String,
    pub key_ring_id: String,
}

/// RPC surface of the remote key-management service.
///
/// Implementations should honor the context's deadline where the transport
/// supports it; callers additionally race every call against the context.
#[async_trait]
pub trait KmsService: Send + Sync {
    async fn get_crypto_key(&self, ctx: &CallContext, name: &str) -> ServiceResult<CryptoKey>;

    async fn get_crypto_key_version(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> ServiceResult<CryptoKeyVersion>;

    /// Versions matching the request, in the requested order.
    async fn list_crypto_key_versions(
        &self,
        ctx: &CallContext,
        request: &ListCryptoKeyVersionsRequest,
    ) -> ServiceResult<Vec<CryptoKeyVersion>>;

    async fn get_public_key(&self, ctx: &CallContext, name: &str)
        -> ServiceResult<PublicKeyResponse>;

    async fn asymmetric_sign(
        &self,
        ctx: &CallContext,
        request: &AsymmetricSignRequest,
    ) -> ServiceResult<AsymmetricSignResponse>;

    async fn create_crypto_key(
        &self,
        ctx: &CallContext,
        request: &CreateCryptoKeyRequest,
    ) -> ServiceResult<CryptoKey>;

    async fn get_key_ring(&self, ctx: &CallContext, name: &str) -> ServiceResult<KeyRing>;

    async fn create_key_ring(
        &self,
        ctx: &CallContext,
        request: &CreateKeyRingRequest,
    ) -> ServiceResult<KeyRing>;
}
