//! Create-if-absent provisioning of key rings and signing keys.

use tracing::{info, warn};

use crate::algorithm::NativeAlgorithm;
use crate::context::CallContext;
use crate::error::{KmsError, KmsResult};
use crate::reference::KeyReference;
use crate::service::{
    CreateCryptoKeyRequest, CreateKeyRingRequest, CryptoKey, CryptoKeyPurpose, KmsService,
};

/// Outcome of [`ensure_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// The key was already present and was left untouched.
    Existing(CryptoKey),
    /// The key was created by this call, or concurrently by another caller.
    Created(CryptoKey),
}

impl KeyStatus {
    pub fn key(&self) -> &CryptoKey {
        match self {
            Self::Existing(key) | Self::Created(key) => key,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Makes sure the reference's key ring exists.
pub async fn ensure_key_ring(
    service: &dyn KmsService,
    reference: &KeyReference,
    ctx: &CallContext,
) -> KmsResult<()> {
    let name = reference.key_ring_name();
    let found = ctx
        .run("get key ring", async { Ok(service.get_key_ring(ctx, &name).await) })
        .await?;
    match found {
        Ok(_) => {
            info!(key_ring = %name, "key ring already exists");
            return Ok(());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(KmsError::service("get key ring", e)),
    }

    let request = CreateKeyRingRequest {
        parent: reference.location_name(),
        key_ring_id: reference.key_ring().to_string(),
    };
    let created = ctx
        .run("create key ring", async { Ok(service.create_key_ring(ctx, &request).await) })
        .await?;
    match created {
        Ok(ring) => info!(key_ring = %ring.name, "created key ring"),
        Err(e) if e.is_already_exists() => info!(key_ring = %name, "key ring created concurrently"),
        Err(e) => return Err(KmsError::service("create key ring", e)),
    }
    Ok(())
}

/// Makes sure the reference's key exists, creating it as an asymmetric
/// signing key with `algorithm` when it does not.
///
/// An existing key is never modified, even when its algorithm differs.
pub async fn ensure_key(
    service: &dyn KmsService,
    reference: &KeyReference,
    algorithm: NativeAlgorithm,
    ctx: &CallContext,
) -> KmsResult<KeyStatus> {
    ensure_key_ring(service, reference, ctx).await?;

    let name = reference.crypto_key_name();
    let found = ctx
        .run("get crypto key", async { Ok(service.get_crypto_key(ctx, &name).await) })
        .await?;
    match found {
        Ok(key) => {
            if key.version_algorithm != algorithm {
                warn!(
                    key = %name,
                    existing = %key.version_algorithm,
                    requested = %algorithm,
                    "key already exists with a different algorithm"
                );
            }
            info!(key = %name, "key already exists");
            return Ok(KeyStatus::Existing(key));
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(KmsError::service("get crypto key", e)),
    }

    let request = CreateCryptoKeyRequest {
        parent: reference.key_ring_name(),
        crypto_key_id: reference.key().to_string(),
        purpose: CryptoKeyPurpose::AsymmetricSign,
        algorithm,
    };
    let created = ctx
        .run("create crypto key", async { Ok(service.create_crypto_key(ctx, &request).await) })
        .await?;
    match created {
        Ok(key) => {
            info!(key = %key.name, %algorithm, "created key");
            Ok(KeyStatus::Created(key))
        }
        Err(e) if e.is_already_exists() => {
            info!(key = %name, "key created concurrently");
            let key = ctx
                .run("get crypto key", async {
                    service
                        .get_crypto_key(ctx, &name)
                        .await
                        .map_err(|e| KmsError::service("get crypto key", e))
                })
                .await?;
            Ok(KeyStatus::Created(key))
        }
        Err(e) => Err(KmsError::service("create crypto key", e)),
    }
}
