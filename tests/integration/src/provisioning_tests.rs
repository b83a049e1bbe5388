//! Idempotent key ring and key provisioning.

use std::sync::Arc;

use cloudsign_kms::testutil::{InMemoryKms, Rpc};
use cloudsign_kms::{CallContext, KeyReference, KmsError, KmsSigner, NativeAlgorithm, PublicKey};

use crate::test_utils::{init_logging, kms_with_key, KEY_REFERENCE};

#[tokio::test]
async fn test_provision_bootstraps_missing_key() {
    init_logging();
    let kms = Arc::new(InMemoryKms::new());
    let ctx = CallContext::new();

    let signer = KmsSigner::provision(kms.clone(), KEY_REFERENCE, "rsa-pkcs1v15-2048-sha256", &ctx)
        .await
        .expect("provisioning succeeds");

    let reference = KeyReference::parse(KEY_REFERENCE).unwrap();
    assert!(kms.has_key_ring(&reference.key_ring_name()));
    let key = kms.crypto_key(&reference.crypto_key_name()).expect("key created");
    assert_eq!(key.version_algorithm, NativeAlgorithm::RsaSignPkcs1_2048Sha256);

    let signature = signer.sign_message(b"bootstrapped", &ctx).await.unwrap();
    assert_eq!(signature.len(), 256);
}

#[tokio::test]
async fn test_create_key_twice_is_idempotent() {
    let kms = Arc::new(InMemoryKms::new());
    let ctx = CallContext::new();

    let signer = KmsSigner::provision(kms.clone(), KEY_REFERENCE, "ecdsa-p256-sha256", &ctx)
        .await
        .unwrap();
    let first = signer.public_key(&ctx).await.unwrap();
    let second = signer.create_key("ecdsa-p256-sha256", &ctx).await.unwrap();
    let third = signer.create_key("ecdsa-p256-sha256", &ctx).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(kms.calls(Rpc::CreateCryptoKey), 1);
    assert_eq!(kms.calls(Rpc::CreateKeyRing), 1);
}

#[tokio::test]
async fn test_existing_key_keeps_its_algorithm() {
    let (kms, version) = kms_with_key(KEY_REFERENCE, NativeAlgorithm::EcSignP256Sha256);
    let ctx = CallContext::new();

    let signer = KmsSigner::provision(kms.clone(), KEY_REFERENCE, "ecdsa-p384-sha384", &ctx)
        .await
        .unwrap();
    let public_key = signer.create_key("ecdsa-p384-sha384", &ctx).await.unwrap();

    assert!(matches!(public_key, PublicKey::EcdsaP256(_)));
    assert_eq!(public_key, kms.public_key(&version));
    assert_eq!(kms.calls(Rpc::CreateCryptoKey), 0);
}

#[tokio::test]
async fn test_unknown_algorithm_rejected_before_any_call() {
    let kms = Arc::new(InMemoryKms::new());

    let err = KmsSigner::provision(kms.clone(), KEY_REFERENCE, "ed25519", &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, KmsError::UnsupportedAlgorithm(_)));
    assert_eq!(kms.total_calls(), 0);
}

#[tokio::test]
async fn test_malformed_reference_rejected_before_any_call() {
    let kms = Arc::new(InMemoryKms::new());

    for reference in [
        "",
        "gcpkms://projects/p/locations/l/keyRings/r",
        "awskms://projects/p/locations/l/keyRings/r/cryptoKeys/k",
        "gcpkms://projects/p/locations/l/keyRings/r/cryptoKeys/k/versions/",
    ] {
        let err = KmsSigner::provision(kms.clone(), reference, "ecdsa-p256-sha256", &CallContext::new())
            .await
            .unwrap_err();
        assert!(
            matches!(err, KmsError::MalformedReference { .. }),
            "{reference:?}: {err}"
        );
    }
    assert_eq!(kms.total_calls(), 0);
}

#[tokio::test]
async fn test_provision_with_configured_default_algorithm() {
    let kms = Arc::new(InMemoryKms::new());
    let mut config = cloudsign_core::KmsConfig::new(KEY_REFERENCE);
    config.default_algorithm = "ecdsa-p384-sha384".into();

    let signer = KmsSigner::provision_with_config(kms.clone(), &config, &CallContext::new())
        .await
        .unwrap();
    assert!(matches!(
        signer.public_key(&CallContext::new()).await.unwrap(),
        PublicKey::EcdsaP384(_)
    ));
}
