//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear
//! error messages.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// A validated region identifier.
///
/// Regions are lowercase identifiers such as `us-east-1` or `cn-north-1`.
/// The newtype guarantees the value is non-empty and contains only
/// lowercase letters, digits, and dashes.
///
/// # Example
///
/// ```rust
/// use nimbus_client::Region;
///
/// let region = Region::new("eu-west-2").unwrap();
/// assert_eq!(region.as_ref(), "eu-west-2");
/// assert!(Region::new("US EAST").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    /// Creates a new validated region.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegion`] if the value is empty or
    /// contains characters outside `[a-z0-9-]`.
    pub fn new(region: impl Into<String>) -> Result<Self, ConfigError> {
        let region = region.into();
        let valid = !region.is_empty()
            && region
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ConfigError::InvalidRegion { region });
        }
        Ok(Self(region))
    }

    /// Returns true for partition regions that use the alternate domain
    /// suffix (the `cn-*` regions).
    #[must_use]
    pub fn is_china(&self) -> bool {
        self.0.starts_with("cn-")
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Region {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Region {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}
