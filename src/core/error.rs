//! Error types for depctx
//!
//! All request-path failures are expressed as [`DepctxError`] variants with
//! named fields. Catalog problems (`GraphCycle`, `DuplicateResource`,
//! `UnknownDependency`, `CatalogParse`) are fatal at load time and never
//! produced while serving requests; `GraphCycle` is additionally checked
//! defensively during per-request traversal.
//!
//! Note that a missing prerequisite is *not* an error: validation encodes it
//! as `ValidationResult { valid: false, .. }` so callers can present an
//! actionable list instead of a bare failure.

use thiserror::Error;

/// Enumerated error types for all depctx failure cases.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum DepctxError {
    /// The resource catalog contains a cycle.
    ///
    /// Detected at catalog load time (fatal) and defensively during request
    /// traversal (should never fire given the load-time check). The chain
    /// lists the resource IDs forming the cycle.
    #[error("circular dependency detected: {chain}")]
    GraphCycle {
        /// Human-readable cycle path, e.g. `"a -> b -> a"`.
        chain: String,
    },

    /// A requested resource ID is not declared in the catalog.
    #[error("unknown resource '{id}'")]
    UnknownResource {
        /// The resource ID that was requested.
        id: String,
    },

    /// The same resource ID was declared twice in the catalog.
    #[error("duplicate resource definition '{id}'")]
    DuplicateResource {
        /// The repeated resource ID.
        id: String,
    },

    /// A definition depends on a resource ID the catalog never declares.
    #[error("resource '{declared_by}' depends on undeclared resource '{id}'")]
    UnknownDependency {
        /// The undeclared dependency ID.
        id: String,
        /// The definition carrying the bad reference.
        declared_by: String,
    },

    /// A tier token budget is misconfigured.
    ///
    /// Defensive only: the truncation policy makes budget overruns
    /// unreachable, but a zero budget would silently produce an empty
    /// context, so aggregation fails loudly instead.
    #[error("invalid token budget: {reason}")]
    TokenBudget {
        /// What is wrong with the configured budgets.
        reason: String,
    },

    /// Content for a generated resource could not be retrieved.
    ///
    /// The user's resource set says the resource exists but the content
    /// lookup returned nothing. Surfaced to the caller, not retried.
    #[error("content unavailable for generated resource '{id}'")]
    ContentUnavailable {
        /// The resource whose content lookup failed.
        id: String,
    },

    /// The wrapped cache computation failed.
    ///
    /// Propagated to every caller awaiting the same in-flight key; the key
    /// is released so a subsequent call retries.
    #[error("cache computation failed: {message}")]
    CacheCompute {
        /// Display chain of the underlying failure.
        message: String,
    },

    /// The catalog file could not be read or parsed.
    #[error("failed to load resource catalog from {path}: {reason}")]
    CatalogParse {
        /// Path of the offending file.
        path: String,
        /// Parse or I/O failure description.
        reason: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("failed to load configuration from {path}: {reason}")]
    ConfigParse {
        /// Path of the offending file.
        path: String,
        /// Parse or I/O failure description.
        reason: String,
    },
}
