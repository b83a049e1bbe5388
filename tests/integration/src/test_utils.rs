//! Test utilities for KMS integration tests

use std::sync::Arc;

use cloudsign_kms::testutil::InMemoryKms;
use cloudsign_kms::{CallContext, KeyReference, KmsSigner, NativeAlgorithm};

/// Unpinned reference used across the suite.
pub const KEY_REFERENCE: &str = "gcpkms://projects/p/locations/l/keyRings/r/cryptoKeys/k";

/// `KEY_REFERENCE` pinned to its first version.
pub fn pinned_reference(version: &str) -> String {
    format!("{KEY_REFERENCE}/versions/{version}")
}

/// Installs a test log subscriber once per process.
pub fn init_logging() {
    let _ = cloudsign_core::logging::try_init();
}

/// A KMS holding one enabled version of `reference` with `algorithm`.
pub fn kms_with_key(reference: &str, algorithm: NativeAlgorithm) -> (Arc<InMemoryKms>, String) {
    let kms = Arc::new(InMemoryKms::new());
    let reference = KeyReference::parse(reference).expect("test reference parses");
    let version = kms.create_signing_key(&reference, algorithm);
    (kms, version)
}

/// A primed signer over a fresh KMS holding one P-256 key.
pub async fn p256_signer(reference: &str) -> (Arc<InMemoryKms>, KmsSigner) {
    let (kms, _) = kms_with_key(reference, NativeAlgorithm::EcSignP256Sha256);
    let signer = KmsSigner::new(kms.clone(), reference, &CallContext::new())
        .await
        .expect("signer primes");
    (kms, signer)
}
