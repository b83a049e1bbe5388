//! Key version resolution.
//!
//! Turns a [`KeyReference`] into the concrete version to sign with, plus the
//! verifier and hash function that version requires. Resolution is the only
//! place that talks to the service outside of signing and provisioning.

use std::sync::Arc;

use tracing::{debug, info};

use crate::algorithm::{hash_for, HashFunction};
use crate::context::CallContext;
use crate::error::{KmsError, KmsResult};
use crate::integrity;
use crate::reference::KeyReference;
use crate::service::{
    CryptoKeyPurpose, CryptoKeyVersion, KmsService, ListCryptoKeyVersionsRequest, ServiceError,
    StatusCode,
};
use crate::verifier::{decode_public_key_pem, LocalVerifier, PublicKey};

/// A key version ready for signing and verification.
#[derive(Debug, Clone)]
pub struct ResolvedKeyVersion {
    version: CryptoKeyVersion,
    verifier: LocalVerifier,
}

impl ResolvedKeyVersion {
    pub fn new(version: CryptoKeyVersion, verifier: LocalVerifier) -> Self {
        Self { version, verifier }
    }

    /// Full resource name of the version.
    pub fn name(&self) -> &str {
        &self.version.name
    }

    pub fn version(&self) -> &CryptoKeyVersion {
        &self.version
    }

    pub fn verifier(&self) -> &LocalVerifier {
        &self.verifier
    }

    pub fn public_key(&self) -> &PublicKey {
        self.verifier.public_key()
    }

    pub fn hash_function(&self) -> HashFunction {
        self.verifier.hash_function()
    }
}

/// Resolves the version a reference currently designates.
pub struct KeyVersionResolver {
    service: Arc<dyn KmsService>,
    reference: KeyReference,
}

impl KeyVersionResolver {
    pub fn new(service: Arc<dyn KmsService>, reference: KeyReference) -> Self {
        Self { service, reference }
    }

    pub fn reference(&self) -> &KeyReference {
        &self.reference
    }

    /// Resolves the reference against the service.
    ///
    /// A pinned reference resolves to exactly its version, which must be
    /// enabled. An unpinned reference resolves to the first enabled version
    /// the service lists in descending name order.
    #[tracing::instrument(name = "resolve", skip_all, fields(key = %self.reference))]
    pub async fn resolve(&self, ctx: &CallContext) -> KmsResult<ResolvedKeyVersion> {
        let key_name = self.reference.crypto_key_name();
        let key = ctx
            .run("resolve", async {
                self.service
                    .get_crypto_key(ctx, &key_name)
                    .await
                    .map_err(|e| KmsError::service("resolve", e))
            })
            .await?;
        if key.purpose != CryptoKeyPurpose::AsymmetricSign {
            return Err(KmsError::NotASigningKey {
                key: key.name,
                purpose: key.purpose.to_string(),
            });
        }

        let version = match self.reference.pinned_version_name() {
            Some(name) => self.pinned(ctx, &name).await?,
            None => self.newest_enabled(ctx, &key_name).await?,
        };

        // Fail on algorithms outside the supported set before fetching key material.
        hash_for(version.algorithm)?;

        let response = ctx
            .run("resolve", async {
                self.service
                    .get_public_key(ctx, &version.name)
                    .await
                    .map_err(|source| public_key_error(&version.name, source))
            })
            .await?;
        if response.pem_crc32c.is_some() {
            integrity::check_response("GetPublicKey", response.pem.as_bytes(), response.pem_crc32c)?;
        }

        let public_key = decode_public_key_pem(&response.pem)?;
        let verifier = LocalVerifier::load(version.algorithm, public_key)?;
        info!(
            version = %version.name,
            algorithm = %version.algorithm,
            key_type = %verifier.public_key().kind(),
            "resolved key version"
        );
        Ok(ResolvedKeyVersion::new(version, verifier))
    }

    async fn pinned(&self, ctx: &CallContext, name: &str) -> KmsResult<CryptoKeyVersion> {
        let version = ctx
            .run("resolve", async {
                self.service
                    .get_crypto_key_version(ctx, name)
                    .await
                    .map_err(|e| KmsError::service("resolve", e))
            })
            .await?;
        if !version.is_enabled() {
            debug!(version = %version.name, state = ?version.state, "pinned version is not enabled");
            return Err(KmsError::NoEnabledVersion {
                key: self.reference.to_string(),
            });
        }
        Ok(version)
    }

    async fn newest_enabled(&self, ctx: &CallContext, key_name: &str) -> KmsResult<CryptoKeyVersion> {
        let request = ListCryptoKeyVersionsRequest::enabled_newest_first(key_name);
        let versions = ctx
            .run("resolve", async {
                self.service
                    .list_crypto_key_versions(ctx, &request)
                    .await
                    .map_err(|e| KmsError::service("resolve", e))
            })
            .await?;
        debug!(candidates = versions.len(), "listed enabled versions");
        versions
            .into_iter()
            .next()
            .ok_or_else(|| KmsError::NoEnabledVersion {
                key: self.reference.to_string(),
            })
    }
}

fn public_key_error(version: &str, source: ServiceError) -> KmsError {
    match source.code {
        StatusCode::Cancelled | StatusCode::DeadlineExceeded => KmsError::service("resolve", source),
        _ => KmsError::PublicKeyFetchFailed {
            version: version.to_string(),
            source,
        },
    }
}
