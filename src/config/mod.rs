//! Configuration for budgets, caching, and aggregation behavior.
//!
//! Every tunable the subsystem exposes lives here with a serde default, so
//! a `DepctxConfig::default()` is fully usable and a TOML file only needs
//! to name the values it overrides:
//!
//! ```toml
//! [budgets]
//! tier1 = 500
//! tier2 = 2000
//! tier3 = 1000
//!
//! [cache]
//! ttl_secs = 86400
//! reap_interval_secs = 300
//!
//! min_fragment_tokens = 50
//! ```
//!
//! The tier budget figures and the 24 h TTL are defaults inherited from the
//! originating system, not invariants; deployments tune them freely.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::DepctxError;

const fn default_tier1() -> usize {
    500
}

const fn default_tier2() -> usize {
    2000
}

const fn default_tier3() -> usize {
    1000
}

/// Token budget per context tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBudgets {
    /// Budget for tier-1 (critical) fragments.
    #[serde(default = "default_tier1")]
    pub tier1: usize,
    /// Budget for tier-2 (required) fragments.
    #[serde(default = "default_tier2")]
    pub tier2: usize,
    /// Budget for tier-3 (optional) fragments.
    #[serde(default = "default_tier3")]
    pub tier3: usize,
}

impl TierBudgets {
    /// Sum of the three tier budgets; the hard cap on
    /// `token_counts.total`.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.tier1 + self.tier2 + self.tier3
    }

    /// Reject unusable budgets.
    ///
    /// A zero budget in any tier would silently drop that tier's content,
    /// so aggregation refuses to run rather than produce an empty context.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::TokenBudget`] naming the zero tier.
    pub fn validate(&self) -> Result<(), DepctxError> {
        for (name, value) in
            [("tier1", self.tier1), ("tier2", self.tier2), ("tier3", self.tier3)]
        {
            if value == 0 {
                return Err(DepctxError::TokenBudget {
                    reason: format!("{name} budget must be greater than zero"),
                });
            }
        }
        Ok(())
    }
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            tier1: default_tier1(),
            tier2: default_tier2(),
            tier3: default_tier3(),
        }
    }
}

const fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

const fn default_reap_interval_secs() -> u64 {
    5 * 60
}

/// Cache TTL and reaper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime in seconds, measured from last write.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval between background reaper sweeps, in seconds.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl CacheConfig {
    /// TTL as a [`Duration`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Reaper interval as a [`Duration`].
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

const fn default_min_fragment_tokens() -> usize {
    50
}

/// Top-level configuration for the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepctxConfig {
    /// Token budget per tier.
    #[serde(default)]
    pub budgets: TierBudgets,
    /// Cache TTL and reaper settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Floor below which a tier-1 fragment is not truncated while budget
    /// remains for it.
    #[serde(default = "default_min_fragment_tokens")]
    pub min_fragment_tokens: usize,
}

impl Default for DepctxConfig {
    fn default() -> Self {
        Self {
            budgets: TierBudgets::default(),
            cache: CacheConfig::default(),
            min_fragment_tokens: default_min_fragment_tokens(),
        }
    }
}

impl DepctxConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::ConfigParse`] on syntax or schema errors.
    pub fn from_toml_str(content: &str) -> Result<Self, DepctxError> {
        toml::from_str(content).map_err(|e| DepctxError::ConfigParse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`DepctxError::ConfigParse`] if the file cannot be read or
    /// parsed.
    pub fn from_path(path: &Path) -> Result<Self, DepctxError> {
        let content = std::fs::read_to_string(path).map_err(|e| DepctxError::ConfigParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| DepctxError::ConfigParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_originating_system() {
        let config = DepctxConfig::default();
        assert_eq!(config.budgets.tier1, 500);
        assert_eq!(config.budgets.tier2, 2000);
        assert_eq!(config.budgets.tier3, 1000);
        assert_eq!(config.budgets.total(), 3500);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86400));
        assert_eq!(config.min_fragment_tokens, 50);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = DepctxConfig::from_toml_str("[budgets]\ntier1 = 800\n").unwrap();
        assert_eq!(config.budgets.tier1, 800);
        assert_eq!(config.budgets.tier2, 2000);
        assert_eq!(config.cache.reap_interval(), Duration::from_secs(300));
    }

    #[test]
    fn zero_budget_fails_validation() {
        let budgets = TierBudgets {
            tier1: 0,
            tier2: 2000,
            tier3: 1000,
        };
        let err = budgets.validate().unwrap_err();
        assert!(matches!(err, DepctxError::TokenBudget { reason } if reason.contains("tier1")));
    }

    #[test]
    fn bad_toml_is_reported() {
        assert!(matches!(
            DepctxConfig::from_toml_str("budgets = 3").unwrap_err(),
            DepctxError::ConfigParse { .. }
        ));
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = DepctxConfig::from_toml_str("").unwrap();
        assert_eq!(config, DepctxConfig::default());
    }
}
