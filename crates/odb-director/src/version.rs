//! Director version parsing and capability gates
//!
//! The director reports either a semantic version ("257.3.0 (00000000)") or,
//! on older releases, a `1.<build>.0.0` version where the build number carries
//! the meaning. Both are compared as an ordered (major, minor, patch) tuple
//! built from the first three dotted numbers.

use thiserror::Error;

/// First semver release supporting on-demand deployments
const ODB_MIN_MAJOR: u64 = 257;
/// First semver release supporting lifecycle errands
const ERRANDS_MIN_MAJOR: u64 = 261;
/// Legacy build numbers for the same two capabilities
const ODB_MIN_LEGACY_BUILD: u64 = 3262;
const ERRANDS_MIN_LEGACY_BUILD: u64 = 3468;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version is not reported")]
    Missing,

    #[error("unrecognised version: {0}")]
    Unparseable(String),
}

/// A director version; derived ordering is the (major, minor, patch) tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirectorVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl DirectorVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the version string reported by the director's `/info` endpoint
    ///
    /// Anything after the first whitespace (usually a commit sha) is ignored,
    /// as are dotted components past the third and a pre-release suffix on
    /// the patch number. A missing patch number reads as zero.
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let token = raw.split_whitespace().next().ok_or(VersionError::Missing)?;
        let unparseable = || VersionError::Unparseable(raw.to_string());

        let mut parts = token.split('.');
        let major = parts.next().and_then(number).ok_or_else(unparseable)?;
        let minor = parts.next().and_then(number).ok_or_else(unparseable)?;
        let patch = match parts.next() {
            Some(part) => leading_number(part).ok_or_else(unparseable)?,
            None => 0,
        };

        Ok(Self::new(major, minor, patch))
    }

    fn is_legacy(&self) -> bool {
        self.major == 1
    }

    pub fn as_tuple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Whether the director can run on-demand service deployments
    pub fn supports_odb(&self) -> bool {
        if self.is_legacy() {
            self.as_tuple() >= (1, ODB_MIN_LEGACY_BUILD, 0)
        } else {
            self.as_tuple() >= (ODB_MIN_MAJOR, 0, 0)
        }
    }

    /// Whether the director can run post-deploy and pre-delete errands
    pub fn supports_lifecycle_errands(&self) -> bool {
        if self.is_legacy() {
            self.as_tuple() >= (1, ERRANDS_MIN_LEGACY_BUILD, 0)
        } else {
            self.as_tuple() >= (ERRANDS_MIN_MAJOR, 0, 0)
        }
    }
}

fn number(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Digits before a pre-release or build suffix ("0-rc.1" reads as 0)
fn leading_number(part: &str) -> Option<u64> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    number(&part[..end])
}

impl std::fmt::Display for DirectorVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
