//! Local signature verification over KMS-held public keys.
//!
//! The private key never leaves the service, but public keys do: each
//! resolved key version carries a [`LocalVerifier`] built from the PEM the
//! service returned, so verification needs no remote call.

use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, Pss, RsaPublicKey};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier;
use thiserror::Error;

use crate::algorithm::{hash_for, HashFunction, NativeAlgorithm, SignatureScheme};
use crate::error::{KmsError, KmsResult};

/// Public key of a KMS key version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// Short description of the key type, for logs and errors.
    pub fn kind(&self) -> String {
        match self {
            Self::EcdsaP256(_) => "ECDSA P-256".to_string(),
            Self::EcdsaP384(_) => "ECDSA P-384".to_string(),
            Self::Rsa(key) => format!("RSA-{}", key.size() * 8),
        }
    }

    /// SPKI PEM encoding of the key.
    pub fn to_pem(&self) -> KmsResult<String> {
        let pem = match self {
            Self::EcdsaP256(key) => key.to_public_key_pem(LineEnding::LF),
            Self::EcdsaP384(key) => key.to_public_key_pem(LineEnding::LF),
            Self::Rsa(key) => key.to_public_key_pem(LineEnding::LF),
        };
        pem.map_err(|e| KmsError::InvalidPem(format!("encoding public key: {e}")))
    }
}

/// Decodes an SPKI ("PUBLIC KEY") PEM document.
pub fn decode_public_key_pem(pem: &str) -> KmsResult<PublicKey> {
    if let Ok(key) = p256::PublicKey::from_public_key_pem(pem) {
        return Ok(PublicKey::EcdsaP256(key));
    }
    if let Ok(key) = p384::PublicKey::from_public_key_pem(pem) {
        return Ok(PublicKey::EcdsaP384(key));
    }
    RsaPublicKey::from_public_key_pem(pem)
        .map(PublicKey::Rsa)
        .map_err(|e| KmsError::InvalidPem(format!("unrecognized public key: {e}")))
}

/// Options for a single verification.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    digest: Option<Vec<u8>>,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify against an already computed digest; the message is ignored.
    pub fn with_digest(digest: impl Into<Vec<u8>>) -> Self {
        Self {
            digest: Some(digest.into()),
        }
    }

    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }
}

/// Why a local verification failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("digest is {actual} bytes, {hash} requires {expected}")]
    DigestLength {
        hash: HashFunction,
        expected: usize,
        actual: usize,
    },

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature does not match public key")]
    Mismatch,
}

impl VerifyError {
    /// True when a different key version could still accept the signature.
    pub fn may_be_stale_key(&self) -> bool {
        matches!(self, Self::Mismatch | Self::MalformedSignature(_))
    }
}

/// Verifier for one public key, scheme and hash function.
#[derive(Debug, Clone)]
pub struct LocalVerifier {
    public_key: PublicKey,
    scheme: SignatureScheme,
    hash: HashFunction,
}

impl LocalVerifier {
    /// Builds the verifier a native algorithm calls for.
    ///
    /// Fails with [`KmsError::UnsupportedAlgorithm`] outside the supported set
    /// and [`KmsError::InvalidPem`] when the key does not fit the algorithm.
    pub fn load(algorithm: NativeAlgorithm, public_key: PublicKey) -> KmsResult<Self> {
        let hash = hash_for(algorithm)?;
        let verifier = match algorithm.signature_scheme()? {
            SignatureScheme::EcdsaP256 | SignatureScheme::EcdsaP384 => {
                Self::ecdsa(public_key, hash)
            }
            SignatureScheme::RsaPkcs1v15 { bits } => {
                check_rsa_size(&public_key, bits)?;
                Self::rsa_pkcs1v15(public_key, hash)
            }
            SignatureScheme::RsaPss { bits } => {
                check_rsa_size(&public_key, bits)?;
                Self::rsa_pss(public_key, hash)
            }
        }?;
        verifier.check_scheme(algorithm)
    }

    /// ECDSA verifier over a P-256 or P-384 key.
    pub fn ecdsa(public_key: PublicKey, hash: HashFunction) -> KmsResult<Self> {
        let scheme = match &public_key {
            PublicKey::EcdsaP256(_) => SignatureScheme::EcdsaP256,
            PublicKey::EcdsaP384(_) => SignatureScheme::EcdsaP384,
            PublicKey::Rsa(_) => {
                return Err(KmsError::InvalidPem(format!(
                    "expected an ECDSA key, got {}",
                    public_key.kind()
                )))
            }
        };
        Ok(Self {
            public_key,
            scheme,
            hash,
        })
    }

    /// RSASSA-PKCS1-v1_5 verifier.
    pub fn rsa_pkcs1v15(public_key: PublicKey, hash: HashFunction) -> KmsResult<Self> {
        let bits = rsa_bits(&public_key)?;
        Ok(Self {
            public_key,
            scheme: SignatureScheme::RsaPkcs1v15 { bits },
            hash,
        })
    }

    /// RSASSA-PSS verifier with salt length equal to the digest length.
    pub fn rsa_pss(public_key: PublicKey, hash: HashFunction) -> KmsResult<Self> {
        let bits = rsa_bits(&public_key)?;
        Ok(Self {
            public_key,
            scheme: SignatureScheme::RsaPss { bits },
            hash,
        })
    }

    fn check_scheme(self, algorithm: NativeAlgorithm) -> KmsResult<Self> {
        if algorithm.signature_scheme()? == self.scheme {
            Ok(self)
        } else {
            Err(KmsError::InvalidPem(format!(
                "{} key does not match algorithm {algorithm}",
                self.public_key.kind()
            )))
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Verifies `signature` over `message`, or over the digest in `opts`.
    ///
    /// ECDSA signatures are expected in ASN.1 DER, as the service returns
    /// them; fixed-width `r || s` encodings are accepted as well.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        message: &[u8],
        opts: &VerifyOptions,
    ) -> Result<(), VerifyError> {
        let digest = match opts.digest() {
            Some(digest) => digest.to_vec(),
            None => self.hash.digest(message),
        };
        if digest.len() != self.hash.output_len() {
            return Err(VerifyError::DigestLength {
                hash: self.hash,
                expected: self.hash.output_len(),
                actual: digest.len(),
            });
        }

        match &self.public_key {
            PublicKey::EcdsaP256(key) => {
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .or_else(|_| p256::ecdsa::Signature::from_slice(signature))
                    .map_err(|e| VerifyError::MalformedSignature(e.to_string()))?;
                p256::ecdsa::VerifyingKey::from(key)
                    .verify_prehash(&digest, &signature)
                    .map_err(|_| VerifyError::Mismatch)
            }
            PublicKey::EcdsaP384(key) => {
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .or_else(|_| p384::ecdsa::Signature::from_slice(signature))
                    .map_err(|e| VerifyError::MalformedSignature(e.to_string()))?;
                p384::ecdsa::VerifyingKey::from(key)
                    .verify_prehash(&digest, &signature)
                    .map_err(|_| VerifyError::Mismatch)
            }
            PublicKey::Rsa(key) => {
                let result = match self.scheme {
                    SignatureScheme::RsaPss { .. } => key.verify(pss(self.hash), &digest, signature),
                    _ => key.verify(pkcs1v15(self.hash), &digest, signature),
                };
                result.map_err(|_| VerifyError::Mismatch)
            }
        }
    }
}

pub(crate) fn pkcs1v15(hash: HashFunction) -> Pkcs1v15Sign {
    match hash {
        HashFunction::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        HashFunction::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashFunction::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashFunction::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

pub(crate) fn pss(hash: HashFunction) -> Pss {
    match hash {
        HashFunction::Sha224 => Pss::new::<Sha224>(),
        HashFunction::Sha256 => Pss::new::<Sha256>(),
        HashFunction::Sha384 => Pss::new::<Sha384>(),
        HashFunction::Sha512 => Pss::new::<Sha512>(),
    }
}

fn rsa_bits(public_key: &PublicKey) -> KmsResult<usize> {
    match public_key {
        PublicKey::Rsa(key) => Ok(key.size() * 8),
        other => Err(KmsError::InvalidPem(format!(
            "expected an RSA key, got {}",
            other.kind()
        ))),
    }
}

fn check_rsa_size(public_key: &PublicKey, bits: usize) -> KmsResult<()> {
    let actual = rsa_bits(public_key)?;
    if actual != bits {
        return Err(KmsError::InvalidPem(format!(
            "expected a {bits}-bit RSA key, got {actual} bits"
        )));
    }
    Ok(())
}
