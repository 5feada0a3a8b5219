//! Container ID generation and name validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CorralError, CorralResult};

/// A full container ID: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Length of a full container ID.
    pub const LENGTH: usize = 64;

    /// Length of the abbreviated form shown to humans.
    pub const SHORT_LENGTH: usize = 12;

    /// Generate a new random container ID.
    ///
    /// The ID is the hex encoding of two v4 UUIDs.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self(hex::encode(bytes))
    }

    /// Get the container ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated ID.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..Self::SHORT_LENGTH.min(self.0.len())]
    }

    fn is_valid(id: &str) -> bool {
        id.len() == Self::LENGTH
            && id
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContainerId {
    type Err = CorralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CorralError::not_found(s))
        }
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Hash and Eq agree with the inner String, so map lookups by &str are sound.
impl std::borrow::Borrow<str> for ContainerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A validated human-readable container name.
///
/// Names must:
/// - Be 1-64 characters long
/// - Contain only alphanumeric characters, `_`, `.` and `-`
/// - Start with an alphanumeric character
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerName(String);

impl ContainerName {
    /// Maximum length of a container name.
    pub const MAX_LENGTH: usize = 64;

    /// Create a new name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CorralError::InvalidName`] if the format is invalid.
    pub fn new(name: impl Into<String>) -> CorralResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Derive a name from a container ID, used when none was supplied.
    #[must_use]
    pub fn from_id(id: &ContainerId) -> Self {
        Self(format!("corral_{}", id.short()))
    }

    /// Get the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> CorralResult<()> {
        let invalid = || CorralError::InvalidName {
            name: name.to_string(),
        };

        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return Err(invalid());
        }

        let mut chars = name.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
            return Err(invalid());
        }

        Ok(())
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContainerName {
    type Error = CorralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContainerName> for String {
    fn from(name: ContainerName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_container_id() {
        let id1 = ContainerId::generate();
        let id2 = ContainerId::generate();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), ContainerId::LENGTH);
        assert_eq!(id1.short().len(), ContainerId::SHORT_LENGTH);
        assert!(id1.as_str().starts_with(id1.short()));
    }

    #[test]
    fn parse_container_id() {
        let id = ContainerId::generate();
        let parsed: ContainerId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);

        assert!("foobar".parse::<ContainerId>().is_err());
        assert!("A".repeat(64).parse::<ContainerId>().is_err());
    }

    #[test]
    fn valid_names() {
        assert!(ContainerName::new("top").is_ok());
        assert!(ContainerName::new("my-container").is_ok());
        assert!(ContainerName::new("my_container.1").is_ok());
        assert!(ContainerName::new("9lives").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(ContainerName::new("").is_err());
        assert!(ContainerName::new("-top").is_err());
        assert!(ContainerName::new(".top").is_err());
        assert!(ContainerName::new("top!").is_err());
        assert!(ContainerName::new("a/b").is_err());
        assert!(ContainerName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn default_name_from_id() {
        let id = ContainerId::generate();
        let name = ContainerName::from_id(&id);
        assert_eq!(name.as_str(), format!("corral_{}", id.short()));
    }

    #[test]
    fn name_deserialization_validates() {
        let ok: ContainerName = serde_json::from_str("\"top\"").unwrap();
        assert_eq!(ok.as_str(), "top");
        assert!(serde_json::from_str::<ContainerName>("\"-bad\"").is_err());
    }
}
