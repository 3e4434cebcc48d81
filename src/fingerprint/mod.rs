//! Version fingerprinting of a user's completed-resource set.
//!
//! The fingerprint is a SHA-256 digest over a canonical serialization of
//! the set: IDs sorted lexicographically and newline-delimited. Two
//! requests with an identical fingerprint are guaranteed to see an
//! identical resource set regardless of insertion order; any change to the
//! set changes the digest. Collisions are out of scope given the
//! cryptographic hash.
//!
//! Fingerprints are embedded in cache keys, which is what makes coarse
//! invalidation safe: a newly generated resource changes the fingerprint,
//! so stale entries can never be returned under the new key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

use crate::core::ResourceId;

/// Deterministic digest of a user's completed-resource set.
///
/// Rendered as `sha256:<64 lowercase hex digits>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a resource-ID set.
    ///
    /// Order-insensitive: the IDs are sorted into canonical form before
    /// hashing.
    pub fn of_set<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceId>,
    {
        let sorted: BTreeSet<&ResourceId> = ids.into_iter().collect();

        let mut hasher = Sha256::new();
        for id in sorted {
            hasher.update(id.as_str().as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();

        Self(format!("sha256:{}", hex::encode(digest)))
    }

    /// Full fingerprint string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix("sha256:").unwrap_or(&self.0);
        &hex[..hex.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
