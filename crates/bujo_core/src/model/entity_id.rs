//! Stable entity identifiers.
//!
//! # Responsibility
//! - Mint globally unique identifiers for journal objects.
//! - Parse and validate the 36-character hyphenated text form.
//!
//! # Invariants
//! - A minted id is never nil.
//! - An id stays attached to one logical object across all its versions.

use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque 128-bit identity shared by every stored version of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Mints a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID, rejecting the nil value.
    pub fn from_uuid(value: Uuid) -> Result<Self, ValidationError> {
        if value.is_nil() {
            return Err(ValidationError::InvalidEntityId(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Parses the hyphenated text form.
    ///
    /// # Errors
    /// - `ValidationError::InvalidEntityId` when the text is not a 36-character
    ///   hyphenated UUID or is the nil UUID.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.len() != 36 {
            return Err(ValidationError::InvalidEntityId(value.to_string()));
        }
        let uuid = Uuid::parse_str(trimmed)
            .map_err(|_| ValidationError::InvalidEntityId(value.to_string()))?;
        Self::from_uuid(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
