// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Configuration for memoized functions
//!
//! Memoization behavior is fixed: keys, single-flight sharing and eviction on
//! failure cannot be tuned. Configuration only covers how a wrapper labels
//! itself in traces and where its seed comes from.
//!
//! # Example: Using defaults
//!
//! ```rust
//! use async_memo::MemoizeConfig;
//!
//! // Random 16-character seed, spans labelled "memoized"
//! let config = MemoizeConfig::default();
//! ```
//!
//! # Example: Custom configuration
//!
//! ```rust
//! use async_memo::MemoizeConfigBuilder;
//!
//! let config = MemoizeConfigBuilder::with_defaults()
//!     .name("fetch_profile")
//!     .seed_length(32)
//!     .build();
//! ```
//!
//! # Example: Reproducible keys
//!
//! ```rust
//! use async_memo::{MemoizeConfigBuilder, Seed};
//!
//! // A fixed seed makes keys identical across wrappers and runs
//! let config = MemoizeConfigBuilder::new().seed(Seed::new("test-seed")).build();
//! ```

use std::sync::Arc;

use crate::canonical::Seed;

pub mod constants;

use constants::{DEFAULT_NAME, DEFAULT_SEED_LENGTH, MIN_SEED_LENGTH};

/// Configuration for one memoized function
///
/// Use [`MemoizeConfigBuilder`] for a fluent API to construct instances.
#[derive(Debug, Clone)]
pub struct MemoizeConfig {
    /// Label recorded on every span and log event of the wrapper
    /// Default: "memoized"
    pub name: Arc<str>,

    /// Explicit seed for placeholder encodings
    /// Default: None (a random seed is generated per wrapper)
    pub seed: Option<Seed>,

    /// Length of the generated seed when `seed` is not set
    /// Default: 16
    pub seed_length: usize,
}

impl Default for MemoizeConfig {
    fn default() -> Self {
        Self {
            name: Arc::from(DEFAULT_NAME),
            seed: None,
            seed_length: DEFAULT_SEED_LENGTH,
        }
    }
}

impl MemoizeConfig {
    /// Resolves the seed a new wrapper should use
    ///
    /// Returns a clone of the explicit seed if set, otherwise a fresh random
    /// seed of `seed_length` characters (at least [`MIN_SEED_LENGTH`]).
    pub fn make_seed(&self) -> Seed {
        match &self.seed {
            Some(seed) => seed.clone(),
            None => Seed::random(self.seed_length.max(MIN_SEED_LENGTH)),
        }
    }
}

/// Builder for [`MemoizeConfig`]
///
/// # Example
///
/// ```rust
/// use async_memo::MemoizeConfigBuilder;
///
/// let config = MemoizeConfigBuilder::new()
///     .name("resolve_user")
///     .build();
/// assert_eq!(&*config.name, "resolve_user");
/// ```
#[derive(Debug, Default)]
pub struct MemoizeConfigBuilder {
    config: MemoizeConfig,
}

impl MemoizeConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: MemoizeConfig::default(),
        }
    }

    /// Start from the defaults
    ///
    /// Equivalent to [`MemoizeConfigBuilder::new`].
    pub fn with_defaults() -> Self {
        Self::new()
    }

    /// Set the label used in spans and log events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Arc::from(name.into());
        self
    }

    /// Use a fixed seed instead of a random one
    ///
    /// Wrappers built from the same fixed seed produce identical keys for
    /// arguments without symbols.
    pub fn seed(mut self, seed: Seed) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Set the generated seed length
    ///
    /// Values below [`MIN_SEED_LENGTH`] are raised to it.
    pub fn seed_length(mut self, len: usize) -> Self {
        self.config.seed_length = len.max(MIN_SEED_LENGTH);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> MemoizeConfig {
        self.config
    }
}
