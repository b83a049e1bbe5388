//! Key reference parsing.
//!
//! A key reference is the symbolic address of a signing key:
//!
//! ```text
//! gcpkms://projects/<PROJECT>/locations/<LOCATION>/keyRings/<KEYRING>/cryptoKeys/<KEY>[/versions/<VERSION>]
//! ```
//!
//! Omitting `/versions/<VERSION>` selects auto-discovery of the active version.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{KmsError, KmsResult};

/// URI scheme for KMS key references.
pub const REFERENCE_SCHEME: &str = "gcpkms://";

/// Human-readable grammar, included in every parse error.
pub const REFERENCE_FORMAT: &str = "gcpkms://projects/[PROJECT_ID]/locations/[LOCATION]/keyRings/[KEY_RING]/cryptoKeys/[KEY]/versions/[VERSION]";

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^gcpkms://projects/([^/]+)/locations/([^/]+)/keyRings/([^/]+)/cryptoKeys/([^/]+)(?:/versions/([^/]+))?$",
    )
    .expect("reference pattern is valid")
});

/// Checks `reference` against the reference grammar.
pub fn validate(reference: &str) -> KmsResult<()> {
    if REFERENCE_RE.is_match(reference) {
        Ok(())
    } else {
        Err(KmsError::malformed_reference(reference))
    }
}

/// A parsed key reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyReference {
    project: String,
    location: String,
    key_ring: String,
    key: String,
    version: Option<String>,
}

impl KeyReference {
    /// Parses a reference URI. Either every field is populated or an error
    /// is returned.
    pub fn parse(reference: &str) -> KmsResult<Self> {
        let caps = REFERENCE_RE
            .captures(reference)
            .ok_or_else(|| KmsError::malformed_reference(reference))?;

        let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
        match (group(1), group(2), group(3), group(4)) {
            (Some(project), Some(location), Some(key_ring), Some(key)) => Ok(Self {
                project,
                location,
                key_ring,
                key,
                version: group(5),
            }),
            _ => Err(KmsError::malformed_reference(reference)),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn key_ring(&self) -> &str {
        &self.key_ring
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The pinned version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// True when the reference names an explicit version. Pinned references
    /// never auto-expire from the cache and never retry verification.
    pub fn is_pinned(&self) -> bool {
        self.version.is_some()
    }

    /// `projects/<P>/locations/<L>`
    pub fn location_name(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.location)
    }

    /// `projects/<P>/locations/<L>/keyRings/<R>`
    pub fn key_ring_name(&self) -> String {
        format!("{}/keyRings/{}", self.location_name(), self.key_ring)
    }

    /// `projects/<P>/locations/<L>/keyRings/<R>/cryptoKeys/<K>`
    pub fn crypto_key_name(&self) -> String {
        format!("{}/cryptoKeys/{}", self.key_ring_name(), self.key)
    }

    /// Service resource name of a version under this key.
    pub fn version_name(&self, version: &str) -> String {
        format!("{}/cryptoKeyVersions/{}", self.crypto_key_name(), version)
    }

    /// Resource name of the pinned version, if any.
    pub fn pinned_version_name(&self) -> Option<String> {
        self.version.as_deref().map(|v| self.version_name(v))
    }
}

impl FromStr for KeyReference {
    type Err = KmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            REFERENCE_SCHEME, self.project, self.location, self.key_ring, self.key
        )?;
        if let Some(version) = &self.version {
            write!(f, "/versions/{version}")?;
        }
        Ok(())
    }
}
