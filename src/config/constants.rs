// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Defaults and fixed limits
//!
//! This module centralizes the constants shared by the canonicalizer and the
//! configuration builder.

/// Name used in spans and log events when none is configured
pub const DEFAULT_NAME: &str = "memoized";

/// Length of a randomly generated seed
pub const DEFAULT_SEED_LENGTH: usize = 16;

/// Shortest random seed the builder accepts
///
/// Shorter requests are raised to this length.
pub const MIN_SEED_LENGTH: usize = 8;

/// Length of the random token identifying one symbol
pub const SYMBOL_TOKEN_LENGTH: usize = 16;

/// Largest integer a double represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed_length_meets_minimum() {
        assert!(DEFAULT_SEED_LENGTH >= MIN_SEED_LENGTH);
    }

    #[test]
    fn test_max_safe_integer() {
        assert_eq!(MAX_SAFE_INTEGER, (2f64).powi(53) - 1.0);
    }
}
