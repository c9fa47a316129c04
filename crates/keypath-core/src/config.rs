//! # Configuration
//!
//! `ResolverConfig` carries the one tunable of the crate: the largest
//! identifier list the batch resolver sends in a single `IN (...)` query.
//!
//! Sources, in the order an application usually layers them:
//! - [`ResolverConfig::default`]: `max_in_items = 500`
//! - a TOML table, via [`ResolverConfig::from_toml_str`]
//! - the `KEYPATH_MAX_IN_ITEMS` environment variable, via
//!   [`ResolverConfig::from_env`]
//!
//! Validation happens once, when a `BatchResolver` is built.

use crate::primitives::{DEFAULT_MAX_IN_ITEMS, ENV_MAX_IN_ITEMS};
use crate::types::KeypathError;
use serde::{Deserialize, Serialize};

/// Batch resolver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum identifiers per bulk query. Must be at least 1.
    pub max_in_items: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_in_items: DEFAULT_MAX_IN_ITEMS,
        }
    }
}

impl ResolverConfig {
    /// Parse a TOML document such as `max_in_items = 200`.
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// `Config` on malformed TOML or an invalid value.
    pub fn from_toml_str(text: &str) -> Result<Self, KeypathError> {
        let config: Self =
            toml::from_str(text).map_err(|e| KeypathError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overridden by `KEYPATH_MAX_IN_ITEMS` when set.
    ///
    /// # Errors
    ///
    /// `Config` if the variable is set but not a positive integer.
    pub fn from_env() -> Result<Self, KeypathError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ResolverConfig::from_env`] over any variable lookup.
    ///
    /// # Errors
    ///
    /// `Config` if the variable is set but not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, KeypathError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_IN_ITEMS) {
            config.max_in_items = raw.trim().parse().map_err(|_| {
                KeypathError::Config(format!("{ENV_MAX_IN_ITEMS}={raw:?} is not an integer"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Config` if `max_in_items` is zero.
    pub fn validate(&self) -> Result<(), KeypathError> {
        if self.max_in_items < 1 {
            return Err(KeypathError::Config(
                "max_in_items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
