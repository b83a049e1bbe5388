//! Cancellation, deadlines, integrity failures and configuration.

use std::sync::Arc;
use std::time::Duration;

use cloudsign_core::KmsConfig;
use cloudsign_kms::testutil::Rpc;
use cloudsign_kms::{CallContext, KmsError, KmsSigner, ServiceError, StatusCode, VerifyOptions};

use crate::test_utils::{init_logging, kms_with_key, p256_signer, KEY_REFERENCE};

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_slow_sign() {
    init_logging();
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    kms.set_latency(Some(Duration::from_secs(3600)));

    let ctx = CallContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = signer.sign_message(b"slow", &ctx).await.unwrap_err();
    assert!(matches!(err, KmsError::Canceled { operation: "sign" }));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_resolution() {
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    signer.invalidate_cache();
    kms.set_latency(Some(Duration::from_secs(30)));

    let ctx = CallContext::with_timeout(Duration::from_secs(5));
    let err = signer.public_key(&ctx).await.unwrap_err();
    assert!(matches!(err, KmsError::DeadlineExceeded { operation: "resolve" }));
    assert!(err.is_cancellation());
}

#[tokio::test]
async fn test_service_reported_cancellation_maps_to_canceled() {
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    kms.fail_next(
        Rpc::AsymmetricSign,
        ServiceError::new(StatusCode::DeadlineExceeded, "upstream deadline"),
    );

    let err = signer
        .sign_message(b"m", &CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, KmsError::DeadlineExceeded { operation: "sign" }));
}

#[tokio::test]
async fn test_corrupted_signature_is_not_returned() {
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    kms.corrupt_signature_checksum(true);

    let err = signer
        .sign_message(b"m", &CallContext::new())
        .await
        .unwrap_err();
    assert!(err.is_integrity_failure());
    assert_eq!(kms.calls(Rpc::AsymmetricSign), 1);

    kms.corrupt_signature_checksum(false);
    assert!(signer.sign_message(b"m", &CallContext::new()).await.is_ok());
}

#[tokio::test]
async fn test_refresh_failure_is_not_masked_by_stale_entry() {
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    signer.invalidate_cache();
    kms.fail_next(Rpc::GetCryptoKey, ServiceError::unavailable("backend down"));

    let err = signer
        .sign_message(b"m", &CallContext::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("backend down"));

    // The next call resolves normally.
    assert!(signer.sign_message(b"m", &CallContext::new()).await.is_ok());
}

#[tokio::test]
async fn test_shared_signer_across_tasks() {
    let (kms, signer) = p256_signer(KEY_REFERENCE).await;
    let signer = Arc::new(signer);

    let handles: Vec<_> = (0..16u8)
        .map(|i| {
            let signer = signer.clone();
            tokio::spawn(async move {
                let ctx = CallContext::new();
                let message = [i; 8];
                let signature = signer.sign_message(&message, &ctx).await?;
                signer
                    .verify(&signature, &message, &VerifyOptions::new(), &ctx)
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(kms.calls(Rpc::AsymmetricSign), 16);
    assert_eq!(kms.calls(Rpc::GetPublicKey), 1);
}

#[tokio::test]
async fn test_signer_from_config_file() {
    let (kms, version) = kms_with_key(KEY_REFERENCE, cloudsign_kms::NativeAlgorithm::EcSignP256Sha256);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cloudsign.toml");
    std::fs::write(
        &path,
        format!(
            "reference = \"{KEY_REFERENCE}\"\ncache_ttl_secs = 60\ncall_timeout_ms = 5000\n"
        ),
    )
    .unwrap();

    let config = KmsConfig::from_file(&path).unwrap();
    let ctx = CallContext::from_config(&config);
    assert!(ctx.deadline().is_some());

    let signer = KmsSigner::with_config(kms, &config, &ctx).await.unwrap();
    let op_ctx = CallContext::from_config(&config);
    assert_eq!(signer.key_version_name(&op_ctx).await.unwrap(), version);
}
