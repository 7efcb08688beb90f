//! Cache eligibility policy.
//!
//! Decides per request whether a remote path is worth caching. Rules are
//! evaluated in a fixed order and the first rule that fires wins:
//!
//! 1. caching disabled
//! 2. location whitelist configured and not matched
//! 3. location blacklist configured and matched
//! 4. table name and table whitelist configured, table not matched
//! 5. both column thresholds configured and `chosen < min`
//!
//! Patterns are compiled once when the rule is built from a configuration
//! snapshot and must match the whole input.

use regex::Regex;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Why a path was excluded from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Caching is switched off globally.
    Disabled,
    /// The path does not match the location whitelist.
    NotWhitelisted,
    /// The path matches the location blacklist.
    Blacklisted,
    /// The table does not match the table whitelist.
    TableNotWhitelisted,
    /// The scan projects fewer columns than the configured minimum.
    TooFewColumns,
}

/// A compiled snapshot of the cache eligibility configuration.
#[derive(Debug, Clone)]
pub struct EligibilityRule {
    enabled: bool,
    location_whitelist: Option<Regex>,
    location_blacklist: Option<Regex>,
    table_name: Option<String>,
    table_whitelist: Option<Regex>,
    min_columns: Option<u32>,
    chosen_columns: Option<u32>,
}

impl EligibilityRule {
    /// Compiles the eligibility options of `config`.
    ///
    /// Fails with [`CacheError::InvalidPattern`] if a regex does not compile.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            enabled: config.cache_enabled,
            location_whitelist: compile(config.location_whitelist.as_deref())?,
            location_blacklist: compile(config.location_blacklist.as_deref())?,
            table_name: config.table_name.clone(),
            table_whitelist: compile(config.table_whitelist.as_deref())?,
            min_columns: config.min_columns,
            chosen_columns: config.chosen_columns,
        })
    }

    /// First rule that excludes `path`, or `None` if it may be cached.
    pub fn skip_reason(&self, path: &str) -> Option<SkipReason> {
        if !self.enabled {
            return Some(SkipReason::Disabled);
        }
        if let Some(whitelist) = &self.location_whitelist {
            if !whitelist.is_match(path) {
                return Some(SkipReason::NotWhitelisted);
            }
        }
        if let Some(blacklist) = &self.location_blacklist {
            if blacklist.is_match(path) {
                return Some(SkipReason::Blacklisted);
            }
        }
        if let (Some(table), Some(whitelist)) = (&self.table_name, &self.table_whitelist) {
            if !whitelist.is_match(table) {
                return Some(SkipReason::TableNotWhitelisted);
            }
        }
        if let (Some(min), Some(chosen)) = (self.min_columns, self.chosen_columns) {
            if chosen < min {
                return Some(SkipReason::TooFewColumns);
            }
        }
        None
    }

    /// Returns true if `path` must bypass the cache.
    pub fn should_skip_cache(&self, path: &str) -> bool {
        match self.skip_reason(path) {
            Some(reason) => {
                debug!(path, ?reason, "skipping cache");
                true
            }
            None => false,
        }
    }
}

/// Returns true if `path` must bypass the cache under `rule`.
pub fn should_skip_cache(path: &str, rule: &EligibilityRule) -> bool {
    rule.should_skip_cache(path)
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(&format!("^(?:{})$", p)).map_err(|source| CacheError::InvalidPattern {
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}
