//! End-to-end sign and verify flows against the in-memory KMS.

use cloudsign_kms::testutil::Rpc;
use cloudsign_kms::{
    crc32c, decode_public_key_pem, CallContext, HashFunction, KmsSigner, NativeAlgorithm,
    PublicKey, VerifyOptions,
};

use crate::test_utils::{init_logging, kms_with_key, p256_signer, KEY_REFERENCE};

#[tokio::test]
async fn test_sign_then_verify_p256() {
    init_logging();
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    let ctx = CallContext::new();

    // SHA-256("abc")
    let digest =
        hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad").unwrap();
    assert_eq!(digest, HashFunction::Sha256.digest(b"abc"));

    let signature = signer
        .sign(&digest, HashFunction::Sha256, 0, &ctx)
        .await
        .expect("sign succeeds");
    assert_eq!(kms.issued_signatures(), vec![signature.clone()]);

    signer
        .verify(&signature, b"abc", &VerifyOptions::new(), &ctx)
        .await
        .expect("signature verifies with the cached public key");

    // Verification is local: no remote call beyond the one sign.
    assert_eq!(kms.calls(Rpc::AsymmetricSign), 1);
    assert_eq!(kms.calls(Rpc::GetPublicKey), 1);
}

#[tokio::test]
async fn test_sign_with_request_checksum() {
    let (_kms, signer) = p256_signer(KEY_REFERENCE).await;
    let ctx = CallContext::new();
    let digest = HashFunction::Sha256.digest(b"checked payload");

    let signature = signer
        .sign(&digest, HashFunction::Sha256, crc32c(&digest), &ctx)
        .await
        .unwrap();
    signer
        .verify(&signature, b"checked payload", &VerifyOptions::new(), &ctx)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_every_locally_generated_algorithm() {
    init_logging();
    for algorithm in [
        NativeAlgorithm::EcSignP256Sha256,
        NativeAlgorithm::EcSignP384Sha384,
        NativeAlgorithm::RsaSignPkcs1_2048Sha256,
        NativeAlgorithm::RsaSignPss2048Sha256,
    ] {
        let (kms, _) = kms_with_key(KEY_REFERENCE, algorithm);
        let signer = KmsSigner::new(kms, KEY_REFERENCE, &CallContext::new())
            .await
            .unwrap();
        let ctx = CallContext::new();

        let signature = signer.sign_message(b"release v1.2.3", &ctx).await.unwrap();
        signer
            .verify(&signature, b"release v1.2.3", &VerifyOptions::new(), &ctx)
            .await
            .unwrap_or_else(|e| panic!("{algorithm}: {e}"));
        assert!(
            signer
                .verify(&signature, b"release v1.2.4", &VerifyOptions::new(), &ctx)
                .await
                .is_err(),
            "{algorithm} accepted a signature over a different message"
        );
    }
}

#[tokio::test]
async fn test_public_key_matches_service_pem() {
    let (kms, version) = kms_with_key(KEY_REFERENCE, NativeAlgorithm::EcSignP384Sha384);
    let signer = KmsSigner::new(kms.clone(), KEY_REFERENCE, &CallContext::new())
        .await
        .unwrap();
    let ctx = CallContext::new();

    let public_key = signer.public_key(&ctx).await.unwrap();
    assert!(matches!(public_key, PublicKey::EcdsaP384(_)));
    assert_eq!(public_key, kms.public_key(&version));

    let pem = public_key.to_pem().unwrap();
    assert_eq!(decode_public_key_pem(&pem).unwrap(), public_key);

    assert_eq!(signer.key_version_name(&ctx).await.unwrap(), version);
    assert_eq!(signer.hash_function(&ctx).await.unwrap(), HashFunction::Sha384);
}
