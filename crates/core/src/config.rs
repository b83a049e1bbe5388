//! Configuration management for CloudSign.

use serde::{Deserialize, Serialize};
use std::env;
#[cfg(feature = "toml")]
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Default time-to-live for an auto-discovered key version (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Algorithm used when provisioning a key without an explicit choice.
pub const DEFAULT_ALGORITHM_NAME: &str = "ecdsa-p256-sha256";

const ENV_REFERENCE: &str = "CLOUDSIGN_KMS_REFERENCE";
const ENV_CACHE_TTL: &str = "CLOUDSIGN_CACHE_TTL_SECS";
const ENV_CALL_TIMEOUT: &str = "CLOUDSIGN_CALL_TIMEOUT_MS";
const ENV_DEFAULT_ALGORITHM: &str = "CLOUDSIGN_DEFAULT_ALGORITHM";

/// Settings for a KMS-backed signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmsConfig {
    /// Key reference URI, e.g. `gcpkms://projects/p/locations/l/keyRings/r/cryptoKeys/k`.
    pub reference: String,
    /// Lifetime of an auto-discovered key version before it is re-resolved.
    /// Ignored for references pinned to a version.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Timeout in milliseconds for a call context built from this
    /// configuration. Measured from when the context is created, so it
    /// bounds every operation run under that context together.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    /// Algorithm name used when provisioning a missing key.
    #[serde(default = "default_algorithm")]
    pub default_algorithm: String,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_algorithm() -> String {
    DEFAULT_ALGORITHM_NAME.to_string()
}

impl KmsConfig {
    /// Configuration for `reference` with every other field at its default.
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            call_timeout_ms: None,
            default_algorithm: default_algorithm(),
        }
    }

    /// Loads and validates a TOML configuration file.
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), reference = %config.reference, "loaded KMS configuration");
        Ok(config)
    }

    /// Parses and validates TOML configuration text.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from `CLOUDSIGN_*` environment variables.
    ///
    /// `CLOUDSIGN_KMS_REFERENCE` is required; the others fall back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reference = lookup(ENV_REFERENCE)
            .ok_or_else(|| CoreError::Config(format!("{ENV_REFERENCE} is not set")))?;

        let cache_ttl_secs = match lookup(ENV_CACHE_TTL) {
            Some(raw) => parse_number(ENV_CACHE_TTL, &raw)?,
            None => DEFAULT_CACHE_TTL_SECS,
        };
        let call_timeout_ms = lookup(ENV_CALL_TIMEOUT)
            .map(|raw| parse_number(ENV_CALL_TIMEOUT, &raw))
            .transpose()?;
        let default_algorithm = lookup(ENV_DEFAULT_ALGORITHM).unwrap_or_else(default_algorithm);

        let config = Self {
            reference,
            cache_ttl_secs,
            call_timeout_ms,
            default_algorithm,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that can be checked without the KMS crate.
    ///
    /// Reference grammar and algorithm names are validated by the signer.
    pub fn validate(&self) -> Result<()> {
        if self.reference.trim().is_empty() {
            return Err(CoreError::Config("reference must not be empty".into()));
        }
        if self.cache_ttl_secs == 0 {
            return Err(CoreError::Config(
                "cache_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(CoreError::Config(
                "call_timeout_ms must be greater than zero when set".into(),
            ));
        }
        if self.default_algorithm.trim().is_empty() {
            return Err(CoreError::Config("default_algorithm must not be empty".into()));
        }
        Ok(())
    }

    /// Cache lifetime for auto-discovered versions.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Call context timeout, if configured.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|e| CoreError::Config(format!("{name}={raw:?} is not a valid number: {e}")))
}
