//! Signature algorithm mapping.
//!
//! Maps caller-facing algorithm names (`ecdsa-p256-sha256`, ...) to the
//! service's native algorithm enumeration, and native algorithms to the hash
//! function and local verification scheme they require. The table is fixed;
//! anything outside it fails closed with [`KmsError::UnsupportedAlgorithm`].

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::{KmsError, KmsResult};

pub const ALGORITHM_ECDSA_P256_SHA256: &str = "ecdsa-p256-sha256";
pub const ALGORITHM_ECDSA_P384_SHA384: &str = "ecdsa-p384-sha384";
pub const ALGORITHM_RSA_PKCS1V15_2048_SHA256: &str = "rsa-pkcs1v15-2048-sha256";
pub const ALGORITHM_RSA_PKCS1V15_3072_SHA256: &str = "rsa-pkcs1v15-3072-sha256";
pub const ALGORITHM_RSA_PKCS1V15_4096_SHA256: &str = "rsa-pkcs1v15-4096-sha256";
pub const ALGORITHM_RSA_PKCS1V15_4096_SHA512: &str = "rsa-pkcs1v15-4096-sha512";
pub const ALGORITHM_RSA_PSS_2048_SHA256: &str = "rsa-pss-2048-sha256";
pub const ALGORITHM_RSA_PSS_3072_SHA256: &str = "rsa-pss-3072-sha256";
pub const ALGORITHM_RSA_PSS_4096_SHA256: &str = "rsa-pss-4096-sha256";
pub const ALGORITHM_RSA_PSS_4096_SHA512: &str = "rsa-pss-4096-sha512";

/// Algorithm used when none is requested.
pub const DEFAULT_ALGORITHM: &str = ALGORITHM_ECDSA_P256_SHA256;

const ALGORITHM_TABLE: &[(&str, NativeAlgorithm)] = &[
    (ALGORITHM_ECDSA_P256_SHA256, NativeAlgorithm::EcSignP256Sha256),
    (ALGORITHM_ECDSA_P384_SHA384, NativeAlgorithm::EcSignP384Sha384),
    (ALGORITHM_RSA_PKCS1V15_2048_SHA256, NativeAlgorithm::RsaSignPkcs1_2048Sha256),
    (ALGORITHM_RSA_PKCS1V15_3072_SHA256, NativeAlgorithm::RsaSignPkcs1_3072Sha256),
    (ALGORITHM_RSA_PKCS1V15_4096_SHA256, NativeAlgorithm::RsaSignPkcs1_4096Sha256),
    (ALGORITHM_RSA_PKCS1V15_4096_SHA512, NativeAlgorithm::RsaSignPkcs1_4096Sha512),
    (ALGORITHM_RSA_PSS_2048_SHA256, NativeAlgorithm::RsaSignPss2048Sha256),
    (ALGORITHM_RSA_PSS_3072_SHA256, NativeAlgorithm::RsaSignPss3072Sha256),
    (ALGORITHM_RSA_PSS_4096_SHA256, NativeAlgorithm::RsaSignPss4096Sha256),
    (ALGORITHM_RSA_PSS_4096_SHA512, NativeAlgorithm::RsaSignPss4096Sha512),
];

/// Caller-facing names of every supported algorithm.
pub const SUPPORTED_ALGORITHMS: [&str; 10] = [
    ALGORITHM_ECDSA_P256_SHA256,
    ALGORITHM_ECDSA_P384_SHA384,
    ALGORITHM_RSA_PKCS1V15_2048_SHA256,
    ALGORITHM_RSA_PKCS1V15_3072_SHA256,
    ALGORITHM_RSA_PKCS1V15_4096_SHA256,
    ALGORITHM_RSA_PKCS1V15_4096_SHA512,
    ALGORITHM_RSA_PSS_2048_SHA256,
    ALGORITHM_RSA_PSS_3072_SHA256,
    ALGORITHM_RSA_PSS_4096_SHA256,
    ALGORITHM_RSA_PSS_4096_SHA512,
];

/// Key version algorithms as enumerated by the KMS service.
///
/// Includes algorithms this client refuses to use so that responses from the
/// service can be represented faithfully and rejected explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeAlgorithm {
    Unspecified,
    GoogleSymmetricEncryption,
    RsaSignPss2048Sha256,
    RsaSignPss3072Sha256,
    RsaSignPss4096Sha256,
    RsaSignPss4096Sha512,
    RsaSignPkcs1_2048Sha256,
    RsaSignPkcs1_3072Sha256,
    RsaSignPkcs1_4096Sha256,
    RsaSignPkcs1_4096Sha512,
    RsaSignRawPkcs1_2048,
    RsaDecryptOaep2048Sha256,
    EcSignP256Sha256,
    EcSignP384Sha384,
    EcSignSecp256k1Sha256,
    HmacSha256,
}

impl NativeAlgorithm {
    /// Service enum name, e.g. `EC_SIGN_P256_SHA256`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "CRYPTO_KEY_VERSION_ALGORITHM_UNSPECIFIED",
            Self::GoogleSymmetricEncryption => "GOOGLE_SYMMETRIC_ENCRYPTION",
            Self::RsaSignPss2048Sha256 => "RSA_SIGN_PSS_2048_SHA256",
            Self::RsaSignPss3072Sha256 => "RSA_SIGN_PSS_3072_SHA256",
            Self::RsaSignPss4096Sha256 => "RSA_SIGN_PSS_4096_SHA256",
            Self::RsaSignPss4096Sha512 => "RSA_SIGN_PSS_4096_SHA512",
            Self::RsaSignPkcs1_2048Sha256 => "RSA_SIGN_PKCS1_2048_SHA256",
            Self::RsaSignPkcs1_3072Sha256 => "RSA_SIGN_PKCS1_3072_SHA256",
            Self::RsaSignPkcs1_4096Sha256 => "RSA_SIGN_PKCS1_4096_SHA256",
            Self::RsaSignPkcs1_4096Sha512 => "RSA_SIGN_PKCS1_4096_SHA512",
            Self::RsaSignRawPkcs1_2048 => "RSA_SIGN_RAW_PKCS1_2048",
            Self::RsaDecryptOaep2048Sha256 => "RSA_DECRYPT_OAEP_2048_SHA256",
            Self::EcSignP256Sha256 => "EC_SIGN_P256_SHA256",
            Self::EcSignP384Sha384 => "EC_SIGN_P384_SHA384",
            Self::EcSignSecp256k1Sha256 => "EC_SIGN_SECP256K1_SHA256",
            Self::HmacSha256 => "HMAC_SHA256",
        }
    }

    /// Caller-facing name, if this algorithm is supported.
    pub fn caller_name(&self) -> Option<&'static str> {
        ALGORITHM_TABLE
            .iter()
            .find(|(_, native)| native == self)
            .map(|(name, _)| *name)
    }

    /// Local verification scheme for this algorithm.
    pub fn signature_scheme(&self) -> KmsResult<SignatureScheme> {
        let scheme = match self {
            Self::EcSignP256Sha256 => SignatureScheme::EcdsaP256,
            Self::EcSignP384Sha384 => SignatureScheme::EcdsaP384,
            Self::RsaSignPkcs1_2048Sha256 => SignatureScheme::RsaPkcs1v15 { bits: 2048 },
            Self::RsaSignPkcs1_3072Sha256 => SignatureScheme::RsaPkcs1v15 { bits: 3072 },
            Self::RsaSignPkcs1_4096Sha256 | Self::RsaSignPkcs1_4096Sha512 => {
                SignatureScheme::RsaPkcs1v15 { bits: 4096 }
            }
            Self::RsaSignPss2048Sha256 => SignatureScheme::RsaPss { bits: 2048 },
            Self::RsaSignPss3072Sha256 => SignatureScheme::RsaPss { bits: 3072 },
            Self::RsaSignPss4096Sha256 | Self::RsaSignPss4096Sha512 => {
                SignatureScheme::RsaPss { bits: 4096 }
            }
            other => return Err(unsupported_native(other)),
        };
        Ok(scheme)
    }
}

impl fmt::Display for NativeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local verification scheme, with the RSA modulus size the key must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    EcdsaP256,
    EcdsaP384,
    RsaPkcs1v15 { bits: usize },
    RsaPss { bits: usize },
}

/// Hash functions a caller may name when signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashFunction {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Digest size in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hashes `message`.
    pub fn digest(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha224 => Sha224::digest(message).to_vec(),
            Self::Sha256 => Sha256::digest(message).to_vec(),
            Self::Sha384 => Sha384::digest(message).to_vec(),
            Self::Sha512 => Sha512::digest(message).to_vec(),
        }
    }
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFunction {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(KmsError::UnsupportedHash(s.to_string())),
        }
    }
}

/// Maps a caller-facing algorithm name to the native algorithm.
pub fn to_native(name: &str) -> KmsResult<NativeAlgorithm> {
    ALGORITHM_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, native)| *native)
        .ok_or_else(|| KmsError::UnsupportedAlgorithm(format!("unknown algorithm requested: {name}")))
}

/// Hash function a native algorithm signs with.
pub fn hash_for(native: NativeAlgorithm) -> KmsResult<HashFunction> {
    match native {
        NativeAlgorithm::EcSignP256Sha256
        | NativeAlgorithm::RsaSignPkcs1_2048Sha256
        | NativeAlgorithm::RsaSignPkcs1_3072Sha256
        | NativeAlgorithm::RsaSignPkcs1_4096Sha256
        | NativeAlgorithm::RsaSignPss2048Sha256
        | NativeAlgorithm::RsaSignPss3072Sha256
        | NativeAlgorithm::RsaSignPss4096Sha256 => Ok(HashFunction::Sha256),
        NativeAlgorithm::EcSignP384Sha384 => Ok(HashFunction::Sha384),
        NativeAlgorithm::RsaSignPkcs1_4096Sha512 | NativeAlgorithm::RsaSignPss4096Sha512 => {
            Ok(HashFunction::Sha512)
        }
        other => Err(unsupported_native(&other)),
    }
}

fn unsupported_native(native: &NativeAlgorithm) -> KmsError {
    KmsError::UnsupportedAlgorithm(format!("unknown algorithm specified by KMS: {native}"))
}
