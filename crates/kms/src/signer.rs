//! Signing and verification façade.
//!
//! [`KmsSigner`] is the entry point for callers: it owns the resolution
//! cache for one key reference, dispatches remote signing with in-transit
//! integrity checks, and verifies locally against the cached public key.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudsign_kms::{CallContext, KmsService, KmsSigner, VerifyOptions};
//!
//! async fn example(service: Arc<dyn KmsService>) -> cloudsign_kms::KmsResult<()> {
//!     let ctx = CallContext::new();
//!     let signer = KmsSigner::new(
//!         service,
//!         "gcpkms://projects/acme/locations/global/keyRings/release/cryptoKeys/cosign",
//!         &ctx,
//!     )
//!     .await?;
//!
//!     let signature = signer.sign_message(b"artifact", &ctx).await?;
//!     signer.verify(&signature, b"artifact", &VerifyOptions::new(), &ctx).await
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cloudsign_core::KmsConfig;
use tracing::{error, info, warn};

use crate::algorithm::{to_native, HashFunction};
use crate::cache::{ResolutionCache, DEFAULT_CACHE_TTL};
use crate::context::CallContext;
use crate::error::{KmsError, KmsResult};
use crate::integrity;
use crate::provision;
use crate::reference::KeyReference;
use crate::resolver::{KeyVersionResolver, ResolvedKeyVersion};
use crate::service::{AsymmetricSignRequest, Digest, KmsService, ServiceError, StatusCode};
use crate::verifier::{PublicKey, VerifyOptions};

/// Signs through the KMS and verifies locally for one key reference.
///
/// Construction resolves the key once and fails if that fails, so a signer
/// always starts with a usable key version. `KmsSigner` is `Send + Sync`;
/// share it through an [`Arc`].
pub struct KmsSigner {
    service: Arc<dyn KmsService>,
    reference: KeyReference,
    cache: ResolutionCache,
}

impl fmt::Debug for KmsSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsSigner")
            .field("reference", &self.reference.to_string())
            .field("cached_version", &self.cache.cached_version_name())
            .finish()
    }
}

impl KmsSigner {
    /// Parses `reference` and primes the cache.
    pub async fn new(
        service: Arc<dyn KmsService>,
        reference: &str,
        ctx: &CallContext,
    ) -> KmsResult<Self> {
        let reference = KeyReference::parse(reference)?;
        Self::build(service, reference, DEFAULT_CACHE_TTL, ctx).await
    }

    /// Builds a signer from validated configuration.
    pub async fn with_config(
        service: Arc<dyn KmsService>,
        config: &KmsConfig,
        ctx: &CallContext,
    ) -> KmsResult<Self> {
        config.validate()?;
        to_native(&config.default_algorithm)?;
        let reference = KeyReference::parse(&config.reference)?;
        Self::build(service, reference, config.cache_ttl(), ctx).await
    }

    /// Creates the key if it does not exist yet, then builds the signer.
    pub async fn provision(
        service: Arc<dyn KmsService>,
        reference: &str,
        algorithm: &str,
        ctx: &CallContext,
    ) -> KmsResult<Self> {
        let reference = KeyReference::parse(reference)?;
        let native = to_native(algorithm)?;
        provision::ensure_key(service.as_ref(), &reference, native, ctx).await?;
        Self::build(service, reference, DEFAULT_CACHE_TTL, ctx).await
    }

    /// Like [`provision`](Self::provision), creating a missing key with the
    /// configured default algorithm.
    pub async fn provision_with_config(
        service: Arc<dyn KmsService>,
        config: &KmsConfig,
        ctx: &CallContext,
    ) -> KmsResult<Self> {
        config.validate()?;
        let native = to_native(&config.default_algorithm)?;
        let reference = KeyReference::parse(&config.reference)?;
        provision::ensure_key(service.as_ref(), &reference, native, ctx).await?;
        Self::build(service, reference, config.cache_ttl(), ctx).await
    }

    async fn build(
        service: Arc<dyn KmsService>,
        reference: KeyReference,
        ttl: Duration,
        ctx: &CallContext,
    ) -> KmsResult<Self> {
        let resolver = KeyVersionResolver::new(service.clone(), reference.clone());
        let cache = ResolutionCache::with_ttl(resolver, ttl);
        let primed = cache.get(ctx).await?;
        info!(
            key = %reference,
            version = %primed.name(),
            pinned = reference.is_pinned(),
            "KMS signer ready"
        );
        Ok(Self {
            service,
            reference,
            cache,
        })
    }

    pub fn reference(&self) -> &KeyReference {
        &self.reference
    }

    /// Signs a precomputed `digest` with the current key version.
    ///
    /// A non-zero `digest_crc32c` is sent along so the service can detect
    /// request corruption. The returned signature's checksum is always
    /// checked.
    #[tracing::instrument(name = "sign", skip_all, fields(key = %self.reference, %hash))]
    pub async fn sign(
        &self,
        digest: &[u8],
        hash: HashFunction,
        digest_crc32c: u32,
        ctx: &CallContext,
    ) -> KmsResult<Vec<u8>> {
        let tagged = match hash {
            HashFunction::Sha256 => Digest::Sha256(digest.to_vec()),
            HashFunction::Sha384 => Digest::Sha384(digest.to_vec()),
            HashFunction::Sha512 => Digest::Sha512(digest.to_vec()),
            other => return Err(KmsError::UnsupportedHash(other.to_string())),
        };
        if digest.len() != hash.output_len() {
            return Err(KmsError::InvalidDigest {
                hash: hash.to_string(),
                expected: hash.output_len(),
                actual: digest.len(),
            });
        }
        ctx.check("sign")?;

        let resolved = self.cache.get(ctx).await?;
        if resolved.hash_function() != hash {
            return Err(KmsError::UnsupportedHash(format!(
                "{hash} does not match {} required by {}",
                resolved.hash_function(),
                resolved.name()
            )));
        }

        let request = AsymmetricSignRequest {
            name: resolved.name().to_string(),
            digest: tagged,
            digest_crc32c: (digest_crc32c != 0).then_some(digest_crc32c),
        };
        let response = ctx
            .run("sign", async {
                self.service
                    .asymmetric_sign(ctx, &request)
                    .await
                    .map_err(|source| remote_sign_error(&request.name, source))
            })
            .await?;

        if request.digest_crc32c.is_some() && !response.verified_digest_crc32c {
            warn!(version = %request.name, "service could not verify digest checksum");
            return Err(KmsError::RequestCorrupted {
                version: request.name,
            });
        }
        if response.name != request.name {
            error!(requested = %request.name, actual = %response.name, "signature from unexpected key version");
            return Err(KmsError::WrongSigningVersion {
                requested: request.name,
                actual: response.name,
            });
        }
        integrity::check_response("AsymmetricSign", &response.signature, response.signature_crc32c)?;
        Ok(response.signature)
    }

    /// Hashes `message` with the key's hash function and signs the digest.
    pub async fn sign_message(&self, message: &[u8], ctx: &CallContext) -> KmsResult<Vec<u8>> {
        let hash = self.hash_function(ctx).await?;
        let digest = hash.digest(message);
        let checksum = integrity::crc32c(&digest);
        self.sign(&digest, hash, checksum, ctx).await
    }

    /// Verifies `signature` over `message` with the cached public key.
    ///
    /// For unpinned references a signature that does not match invalidates
    /// the cache and retries once against a freshly resolved version, since
    /// the key may have been rotated. Pinned references and malformed
    /// caller input fail without retrying.
    #[tracing::instrument(name = "verify", skip_all, fields(key = %self.reference))]
    pub async fn verify(
        &self,
        signature: &[u8],
        message: &[u8],
        opts: &VerifyOptions,
        ctx: &CallContext,
    ) -> KmsResult<()> {
        ctx.check("verify")?;
        let resolved = self.cache.get(ctx).await?;
        let first = match resolved.verifier().verify_signature(signature, message, opts) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if self.reference.is_pinned() || !first.may_be_stale_key() {
            return Err(verification_failed(&resolved, first.to_string()));
        }

        warn!(
            version = %resolved.name(),
            reason = %first,
            "verification failed, re-resolving key version"
        );
        self.cache.invalidate();
        let refreshed = self.cache.get(ctx).await?;
        refreshed
            .verifier()
            .verify_signature(signature, message, opts)
            .map_err(|e| verification_failed(&refreshed, e.to_string()))
    }

    /// Public key of the current key version.
    pub async fn public_key(&self, ctx: &CallContext) -> KmsResult<PublicKey> {
        Ok(self.cache.get(ctx).await?.public_key().clone())
    }

    /// Creates the key with `algorithm` if it does not exist, and returns
    /// the public key of its current version.
    ///
    /// Idempotent: an existing key is returned as-is.
    #[tracing::instrument(name = "create_key", skip_all, fields(key = %self.reference, %algorithm))]
    pub async fn create_key(&self, algorithm: &str, ctx: &CallContext) -> KmsResult<PublicKey> {
        let native = to_native(algorithm)?;
        let status = provision::ensure_key(self.service.as_ref(), &self.reference, native, ctx).await?;
        if status.was_created() {
            self.cache.invalidate();
        }
        self.public_key(ctx).await
    }

    /// Hash function the current key version signs with.
    pub async fn hash_function(&self, ctx: &CallContext) -> KmsResult<HashFunction> {
        Ok(self.cache.get(ctx).await?.hash_function())
    }

    /// Resource name of the current key version.
    pub async fn key_version_name(&self, ctx: &CallContext) -> KmsResult<String> {
        Ok(self.cache.get(ctx).await?.name().to_string())
    }

    /// Forces the next operation to re-resolve the key version.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }
}

fn remote_sign_error(version: &str, source: ServiceError) -> KmsError {
    match source.code {
        StatusCode::Cancelled | StatusCode::DeadlineExceeded => KmsError::service("sign", source),
        _ => KmsError::RemoteSignFailed {
            version: version.to_string(),
            source,
        },
    }
}

fn verification_failed(resolved: &ResolvedKeyVersion, reason: String) -> KmsError {
    KmsError::VerificationFailed {
        version: resolved.name().to_string(),
        reason,
    }
}
