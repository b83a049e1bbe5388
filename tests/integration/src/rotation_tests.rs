//! Key rotation handling.

use cloudsign_kms::testutil::Rpc;
use cloudsign_kms::{
    CallContext, KeyReference, KmsError, KmsSigner, NativeAlgorithm, VerifyOptions,
};

use crate::test_utils::{init_logging, kms_with_key, pinned_reference, KEY_REFERENCE};

#[tokio::test]
async fn test_rotated_out_signature_fails_after_one_retry() {
    init_logging();
    let (kms, v1) = kms_with_key(KEY_REFERENCE, NativeAlgorithm::EcSignP256Sha256);
    let key_name = KeyReference::parse(KEY_REFERENCE).unwrap().crypto_key_name();
    let old_signature = kms.sign_message(&v1, b"artifact");

    kms.rotate(&key_name);
    let signer = KmsSigner::new(kms.clone(), KEY_REFERENCE, &CallContext::new())
        .await
        .unwrap();
    // Rotate again between priming and verification.
    let v3 = kms.rotate(&key_name);
    let lookups = kms.calls(Rpc::GetCryptoKey);

    let ctx = CallContext::new();
    let err = signer
        .verify(&old_signature, b"artifact", &VerifyOptions::new(), &ctx)
        .await
        .unwrap_err();

    match err {
        KmsError::VerificationFailed { version, .. } => assert_eq!(version, v3),
        other => panic!("expected VerificationFailed, got {other:?}"),
    }
    assert_eq!(kms.calls(Rpc::GetCryptoKey), lookups + 1);
    assert_eq!(signer.key_version_name(&ctx).await.unwrap(), v3);
}

#[tokio::test]
async fn test_signature_from_new_version_verifies_after_retry() {
    let (kms, _) = kms_with_key(KEY_REFERENCE, NativeAlgorithm::EcSignP256Sha256);
    let signer = KmsSigner::new(kms.clone(), KEY_REFERENCE, &CallContext::new())
        .await
        .unwrap();

    let v2 = kms.rotate(&signer.reference().crypto_key_name());
    let signature = kms.sign_message(&v2, b"artifact");

    signer
        .verify(&signature, b"artifact", &VerifyOptions::new(), &CallContext::new())
        .await
        .expect("retry against the rotated version succeeds");
}

#[tokio::test]
async fn test_pinned_reference_ignores_rotation() {
    let reference = pinned_reference("1");
    let (kms, v1) = kms_with_key(&reference, NativeAlgorithm::EcSignP256Sha256);
    let signer = KmsSigner::new(kms.clone(), &reference, &CallContext::new())
        .await
        .unwrap();
    let ctx = CallContext::new();

    let v2 = kms.rotate(&signer.reference().crypto_key_name());
    let signature = kms.sign_message(&v2, b"artifact");
    let calls = kms.total_calls();

    let err = signer
        .verify(&signature, b"artifact", &VerifyOptions::new(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, KmsError::VerificationFailed { .. }));
    assert_eq!(kms.total_calls(), calls, "pinned verification made a remote call");

    // Signing keeps using the pinned version.
    let own = signer.sign_message(b"artifact", &ctx).await.unwrap();
    signer
        .verify(&own, b"artifact", &VerifyOptions::new(), &ctx)
        .await
        .unwrap();
    assert_eq!(signer.key_version_name(&ctx).await.unwrap(), v1);
}

#[tokio::test(start_paused = true)]
async fn test_signing_moves_to_new_version_after_ttl() {
    let (kms, v1) = kms_with_key(KEY_REFERENCE, NativeAlgorithm::EcSignP256Sha256);
    let signer = KmsSigner::new(kms.clone(), KEY_REFERENCE, &CallContext::new())
        .await
        .unwrap();
    let ctx = CallContext::new();
    let v2 = kms.rotate(&signer.reference().crypto_key_name());

    signer.sign_message(b"a", &ctx).await.unwrap();
    assert_eq!(signer.key_version_name(&ctx).await.unwrap(), v1);

    tokio::time::advance(cloudsign_kms::DEFAULT_CACHE_TTL).await;
    signer.sign_message(b"b", &ctx).await.unwrap();
    assert_eq!(signer.key_version_name(&ctx).await.unwrap(), v2);
}
