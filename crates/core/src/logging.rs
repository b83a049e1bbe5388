//! Structured logging infrastructure for CloudSign.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system with human-readable output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level. KMS client internals log under the
/// `cloudsign_kms` target, so `RUST_LOG=cloudsign_kms=debug` shows cache
/// hits, misses and refreshes.
///
/// # Example
/// ```no_run
/// use cloudsign_core::logging;
///
/// logging::init();
/// tracing::info!("Signer started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for production environments.
///
/// Same filtering rules as [`init`].
///
/// # Example
/// ```no_run
/// use cloudsign_core::logging;
///
/// logging::init_json();
/// tracing::info!(key = "projects/p/locations/l/keyRings/r/cryptoKeys/k", "Signer started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Like [`init`], but returns instead of panicking when a global subscriber
/// is already installed. Handy in tests and embedding applications.
pub fn try_init() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_test_writer())
        .try_init()
        .is_ok()
}
