//! Semantic versions used for schema gating.
//!
//! Stored and declared versions are compared numerically (`1.10.0 > 1.9.0`),
//! never lexically. Short forms such as `1` or `1.2` are accepted and padded
//! with zeros, so `1.2` and `1.2.0` are the same version. Build metadata
//! carries no precedence and is dropped: `1.2.0+hotfix` is `1.2.0`.

use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SchemaError};

/// A schema version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(Version);

impl SchemaVersion {
    /// The version of a store that has never been migrated.
    pub const ZERO: Self = Self(Version::new(0, 0, 0));

    /// Creates a version from its numeric parts.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parses a version string.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        match Version::parse(trimmed) {
            Ok(version) => Ok(Self::from(version)),
            Err(full_err) => {
                let parts: Vec<&str> = trimmed.split('.').collect();
                if parts.is_empty() || parts.len() > 2 {
                    return Err(invalid(value, &full_err.to_string()));
                }
                let mut numbers = [0u64; 3];
                for (slot, part) in numbers.iter_mut().zip(&parts) {
                    *slot = part
                        .parse::<u64>()
                        .map_err(|_| invalid(value, &full_err.to_string()))?;
                }
                Ok(Self::new(numbers[0], numbers[1], numbers[2]))
            }
        }
    }

    /// Returns the underlying semver value.
    #[must_use]
    pub fn as_semver(&self) -> &Version {
        &self.0
    }

    /// Returns true if `from < self <= to`.
    #[must_use]
    pub fn in_range(&self, from: &Self, to: &Self) -> bool {
        self > from && self <= to
    }
}

fn invalid(value: &str, reason: &str) -> SchemaError {
    SchemaError::InvalidVersion {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<Version> for SchemaVersion {
    fn from(mut version: Version) -> Self {
        version.build = BuildMetadata::EMPTY;
        Self(version)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
