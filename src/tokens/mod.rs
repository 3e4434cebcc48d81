//! Token estimation for context budget accounting.
//!
//! Aggregation needs a token count per candidate fragment before any AI
//! call happens, so counting is approximate by design. The estimator is a
//! trait so deployments can plug in a real BPE tokenizer; the default
//! [`HeuristicTokenEstimator`] uses the common ~4 bytes/token rule, which
//! is cheap and errs slightly high for prose.
//!
//! # Usage
//!
//! ```rust
//! use depctx::tokens::{HeuristicTokenEstimator, TokenEstimator};
//!
//! let estimator = HeuristicTokenEstimator::default();
//! let count = estimator.estimate("Hello, world!");
//! assert!(count > 0);
//! ```

/// Estimates and truncates content by token count.
///
/// Implementations must be deterministic and must satisfy the truncation
/// contract: `estimate(truncate_to(s, n)) <= n` for every input. The budget
/// invariant of aggregation rests on that contract.
pub trait TokenEstimator: Send + Sync {
    /// Approximate token count of `content`.
    fn estimate(&self, content: &str) -> usize;

    /// Truncate `content` so its estimate does not exceed `max_tokens`.
    ///
    /// The default implementation binary-searches the longest prefix (on
    /// char boundaries) whose estimate fits. Returns an empty string for a
    /// zero budget.
    fn truncate_to(&self, content: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }
        if self.estimate(content) <= max_tokens {
            return content.to_string();
        }

        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(content.len()))
            .collect();

        // Largest boundary index whose prefix still fits.
        let mut lo = 0;
        let mut hi = boundaries.len() - 1;
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            if self.estimate(&content[..boundaries[mid]]) <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        content[..boundaries[lo]].to_string()
    }
}

/// Byte-length based token estimator (~4 bytes per token).
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTokenEstimator {
    bytes_per_token: usize,
}

impl HeuristicTokenEstimator {
    /// Create an estimator with a custom bytes-per-token ratio.
    ///
    /// A ratio of zero is clamped to one.
    #[must_use]
    pub const fn new(bytes_per_token: usize) -> Self {
        Self {
            bytes_per_token: if bytes_per_token == 0 {
                1
            } else {
                bytes_per_token
            },
        }
    }
}

impl Default for HeuristicTokenEstimator {
    fn default() -> Self {
        Self::new(4)
    }
}

impl TokenEstimator for HeuristicTokenEstimator {
    fn estimate(&self, content: &str) -> usize {
        content.len().div_ceil(self.bytes_per_token)
    }
}

/// Format a token count for human-readable display.
///
/// Formats large numbers with k/M suffixes for readability.
#[must_use]
pub fn format_token_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}
