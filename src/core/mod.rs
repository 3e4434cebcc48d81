//! Core types and error handling for depctx
//!
//! This module provides the identifier newtypes shared by every other module
//! and the crate-wide error type:
//! - [`ResourceId`] / [`UserId`] - strongly-typed identifiers
//! - [`DepctxError`] - enumerated error types for all failure cases
//!
//! The error system follows two principles: strongly-typed variants for
//! precise handling in code, and messages that name the offending identifier
//! so callers can surface something actionable.

pub mod error;

pub use error::DepctxError;

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a resource type in the catalog (e.g. `"buyer-persona"`).
///
/// Resource IDs are opaque strings chosen by the catalog author. They are
/// compared byte-for-byte and used as graph node labels, cache key parts,
/// and fingerprint input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Create a resource ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of the user a request is served for.
///
/// The subsystem never interprets user IDs; they partition cache entries and
/// scope invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// View the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_display_and_eq() {
        let id = ResourceId::from("icp-analysis");
        assert_eq!(id.to_string(), "icp-analysis");
        assert_eq!(id, ResourceId::new("icp-analysis".to_string()));
    }

    #[test]
    fn resource_id_serde_transparent() {
        let id = ResourceId::from("buyer-persona");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"buyer-persona\"");
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn user_id_roundtrip() {
        let user = UserId::from("user-42");
        assert_eq!(user.as_str(), "user-42");
    }
}
