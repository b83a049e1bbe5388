//! In-transit integrity checks.
//!
//! The KMS service protects requests and responses with CRC-32C
//! (Castagnoli) checksums. Checksums are compared against the service's own
//! values, so this must be the exact Castagnoli polynomial. These are
//! transport checks only and carry no authentication.

use crate::error::{KmsError, KmsResult};

/// CRC-32C of `data`.
pub fn crc32c(data: &[u8]) -> u32 {
    ::crc32c::crc32c(data)
}

/// True when `expected` is present and matches the checksum of `data`.
pub fn verify_crc32c(data: &[u8], expected: Option<u32>) -> bool {
    expected == Some(crc32c(data))
}

/// Fails with [`KmsError::ResponseCorrupted`] unless `data` hashes to the
/// checksum the service claimed for it.
pub(crate) fn check_response(
    operation: &'static str,
    data: &[u8],
    claimed: Option<u32>,
) -> KmsResult<()> {
    let actual = crc32c(data);
    if claimed == Some(actual) {
        return Ok(());
    }
    tracing::error!(
        operation,
        expected = ?claimed,
        actual,
        "response checksum mismatch"
    );
    Err(KmsError::ResponseCorrupted {
        operation,
        expected: claimed,
        actual,
    })
}
