//! Integration tests for the CloudSign KMS client
//!
//! This test suite validates:
//! - End-to-end sign and verify against an in-memory KMS
//! - Key rotation handling for pinned and unpinned references
//! - Idempotent provisioning of key rings and keys
//! - Cancellation, deadlines and in-transit integrity failures
//! - Configuration-driven construction

pub mod test_utils;

#[cfg(test)]
mod signing_flow_tests;

#[cfg(test)]
mod rotation_tests;

#[cfg(test)]
mod provisioning_tests;

#[cfg(test)]
mod resilience_tests;
